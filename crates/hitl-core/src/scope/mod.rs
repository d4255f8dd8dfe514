//! Tenant scope
//!
//! Every network call is scoped to an (organization, project) pair. The pair
//! is resolved from the route and a persisted fallback by [`ScopeResolver`],
//! published by the single [`ScopeSynchronizer`], and read live through
//! [`ScopeHandle`]s.

mod resolver;
mod route;
mod session;
mod store;
mod sync;

pub use resolver::ScopeResolver;
pub use route::{parse_route, RouteForm, RouteScope, RouteSegment};
pub use session::{SessionProvider, StaticSession};
pub use store::{ChangeOrigin, FallbackChange, FallbackStore, FileFallbackStore, MemoryFallbackStore};
pub use sync::{ScopeHandle, ScopeSnapshot, ScopeSynchronizer};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Active tenant scope
///
/// Either field may be absent. A scope with neither is unresolved and
/// scoped operations refuse to run under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeContext {
    /// Organization id
    #[serde(default)]
    pub org_id: Option<String>,
    /// Project id
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ScopeContext {
    /// Create scope
    #[must_use]
    pub fn new(org_id: Option<&str>, project_id: Option<&str>) -> Self {
        Self {
            org_id: org_id.map(str::to_string),
            project_id: project_id.map(str::to_string),
        }
    }

    /// The unresolved scope
    #[inline]
    #[must_use]
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Check if at least one id is known
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.org_id.is_some() || self.project_id.is_some()
    }
}

impl fmt::Display for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "org={} project={}",
            self.org_id.as_deref().unwrap_or("-"),
            self.project_id.as_deref().unwrap_or("-")
        )
    }
}
