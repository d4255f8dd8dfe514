//! Review engine configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Proposal types applied through the scoped apply endpoint
pub const DEFAULT_PREVIEW_ONLY_TYPES: &[&str] = &[
    "generate_concept_brief",
    "generate_hydration",
    "hydration_complete",
];

/// Arguments that identify the logical decision a proposal is about
pub const DEFAULT_IDENTITY_ARGS: &[&str] = &["trigger_id"];

/// Record statuses that count as awaiting review
pub const DEFAULT_PENDING_STATUSES: &[&str] = &["pending", "proposed"];

/// Keys under which the tenant fallback is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackKeys {
    /// Organization id key
    pub org_key: String,
    /// Project id key
    pub project_key: String,
}

impl Default for FallbackKeys {
    fn default() -> Self {
        Self {
            org_key: "hitl.org_id".to_string(),
            project_key: "hitl.project_id".to_string(),
        }
    }
}

/// Review engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Base URL of the decision backend
    pub backend_url: String,
    /// Run thread the interrupt stream follows
    pub thread_id: Option<String>,
    /// Persisted-source fetch timeout, in milliseconds
    pub request_timeout_ms: u64,
    /// Decision apply timeout, in milliseconds
    pub apply_timeout_ms: u64,
    /// Types routed through the scoped apply endpoint
    pub preview_only_types: Vec<String>,
    /// Argument names forming the merge identity key, first present wins
    pub identity_args: Vec<String>,
    /// Record statuses treated as pending
    pub pending_statuses: Vec<String>,
    /// Fallback store keys
    pub fallback: FallbackKeys,
    /// File backing the fallback store; memory only when unset
    pub fallback_path: Option<PathBuf>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            thread_id: None,
            request_timeout_ms: 10_000,
            apply_timeout_ms: 30_000,
            preview_only_types: to_strings(DEFAULT_PREVIEW_ONLY_TYPES),
            identity_args: to_strings(DEFAULT_IDENTITY_ARGS),
            pending_statuses: to_strings(DEFAULT_PENDING_STATUSES),
            fallback: FallbackKeys::default(),
            fallback_path: None,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

impl ReviewConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] when values are unusable.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded review config");
        Ok(config)
    }

    /// Check values
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for the first unusable field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "backend_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.apply_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "apply_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.pending_statuses.is_empty() {
            return Err(ConfigError::Invalid {
                field: "pending_statuses",
                reason: "at least one status is required".to_string(),
            });
        }
        Ok(())
    }

    /// With backend URL
    #[inline]
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// With thread id
    #[inline]
    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// With persisted-source fetch timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    /// With apply timeout
    #[inline]
    #[must_use]
    pub fn with_apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout_ms = duration_ms(timeout);
        self
    }

    /// With an extra preview-only type
    #[inline]
    #[must_use]
    pub fn with_preview_only_type(mut self, proposal_type: impl Into<String>) -> Self {
        let proposal_type = proposal_type.into();
        if !self.preview_only_types.contains(&proposal_type) {
            self.preview_only_types.push(proposal_type);
        }
        self
    }

    /// With identity argument names
    #[inline]
    #[must_use]
    pub fn with_identity_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// With fallback file
    #[inline]
    #[must_use]
    pub fn with_fallback_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_path = Some(path.into());
        self
    }

    /// Persisted-source fetch timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Apply timeout
    #[inline]
    #[must_use]
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }

    /// Preview-only types as a set
    #[must_use]
    pub fn preview_only_set(&self) -> HashSet<String> {
        self.preview_only_types.iter().cloned().collect()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
