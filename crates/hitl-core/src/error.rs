//! Error types for HITL Core
//!
//! Provides error handling for:
//! - Tenant scope resolution and the cross-tenant guard
//! - Source fetches that degrade instead of failing
//! - Decision application and rollback
//! - Configuration and fallback store I/O

use crate::proposal::ProposalStatus;
use crate::scope::ScopeContext;
use hitl_diff::DiffShapeError;
use std::path::PathBuf;

/// Main review error type
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// No organization or project could be resolved
    #[error("no organization or project is selected")]
    ScopeUnresolved,

    /// The item was produced under a different tenant than the active one
    #[error("decision scope {item_scope} does not match active scope {active_scope}")]
    ScopeMismatch {
        /// Scope the item was created under
        item_scope: ScopeContext,
        /// Scope active at decision time
        active_scope: ScopeContext,
    },

    /// Persisted-source fetch failed
    #[error("failed to fetch persisted decisions: {0}")]
    SourceFetchFailed(String),

    /// Applying a decision failed; message is the backend's, verbatim
    #[error("{message}")]
    ApplyFailed {
        /// Item the decision was for
        item_id: String,
        /// Backend message
        message: String,
    },

    /// No renderer for a content type
    #[error("no renderer registered for content type '{0}'")]
    RendererMissing(String),

    /// Diff envelope breaks its contract
    #[error("invalid diff envelope: {0}")]
    DiffShapeInvalid(#[from] DiffShapeError),

    /// State machine rejected a transition
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: ProposalStatus,
        /// Requested status
        to: ProposalStatus,
    },

    /// Item already reached a terminal state
    #[error("proposal {item_id} was already {status}")]
    AlreadyDecided {
        /// Item identifier
        item_id: String,
        /// Terminal status
        status: ProposalStatus,
    },

    /// Item not known to the aggregator
    #[error("unknown proposal: {0}")]
    UnknownItem(String),

    /// Operation timed out
    #[error("operation timed out after {duration_ms}ms")]
    Timeout {
        /// Timeout that elapsed
        duration_ms: u64,
    },

    /// Operation was cancelled by a scope change
    #[error("operation cancelled")]
    Cancelled,

    /// Backend transport error
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fallback store error
    #[error("fallback store error: {0}")]
    Store(#[from] StoreError),
}

impl ReviewError {
    /// Errors the reviewer should see rather than only the logs
    #[inline]
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::ScopeUnresolved | Self::ScopeMismatch { .. } | Self::ApplyFailed { .. }
        )
    }

    /// Check if retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SourceFetchFailed(_) | Self::Timeout { .. } | Self::ApplyFailed { .. } => true,
            Self::Backend(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Message suitable for showing to the reviewer
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ScopeMismatch { .. } => "this decision belongs to a different project".to_string(),
            Self::ScopeUnresolved => "select an organization or project first".to_string(),
            other => other.to_string(),
        }
    }

    /// Create apply failure
    #[inline]
    pub fn apply_failed(item_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApplyFailed {
            item_id: item_id.into(),
            message: message.into(),
        }
    }
}

/// Errors reported by a decision backend or interrupt stream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Non-success HTTP status
    #[error("{message}")]
    Http {
        /// Status code
        status: u16,
        /// Response body or detail message
        message: String,
    },

    /// Connection-level failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// Backend accepted the call but reported an error status
    #[error("{0}")]
    Rejected(String),
}

impl BackendError {
    /// Backend-provided message, unchanged
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Http { message, .. } => message,
            Self::Transport(message) | Self::Decode(message) | Self::Rejected(message) => message,
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Transport(_) => true,
            Self::Decode(_) | Self::Rejected(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for [`crate::ReviewConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but are unusable
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Fallback store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store file I/O failed
    #[error("fallback store I/O on {path}: {source}")]
    Io {
        /// Store path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Store file is not a JSON object of strings
    #[error("fallback store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ReviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_errors() {
        assert!(ReviewError::ScopeUnresolved.is_user_facing());
        assert!(ReviewError::apply_failed("i1", "quota exceeded").is_user_facing());
        assert!(!ReviewError::Cancelled.is_user_facing());
        assert!(!ReviewError::SourceFetchFailed("503".into()).is_user_facing());
    }

    #[test]
    fn scope_mismatch_message() {
        let err = ReviewError::ScopeMismatch {
            item_scope: ScopeContext::new(Some("o1"), Some("p1")),
            active_scope: ScopeContext::new(Some("o2"), Some("p2")),
        };
        assert_eq!(err.user_message(), "this decision belongs to a different project");
        assert!(err.to_string().contains("o1"));
    }

    #[test]
    fn apply_failed_is_verbatim() {
        let err = ReviewError::apply_failed("i1", "KG write rejected: stale sha");
        assert_eq!(err.user_message(), "KG write rejected: stale sha");
    }

    #[test]
    fn backend_retryable() {
        let server = BackendError::Http {
            status: 503,
            message: "unavailable".into(),
        };
        let client = BackendError::Http {
            status: 422,
            message: "bad".into(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(ReviewError::from(server).is_retryable());
        assert_eq!(client.message(), "bad");
    }
}
