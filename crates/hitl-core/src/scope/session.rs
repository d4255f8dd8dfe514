//! Auth/session provider

use super::ScopeContext;
use std::fmt::Debug;

/// Source of the bearer credential and the identity's default tenant
pub trait SessionProvider: Send + Sync + Debug {
    /// Bearer token, if signed in
    fn bearer_token(&self) -> Option<String>;

    /// Tenant the identity belongs to by default; last resort for scope resolution
    fn default_scope(&self) -> ScopeContext;
}

/// Fixed session, configured up front
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSession {
    token: Option<String>,
    scope: ScopeContext,
}

impl StaticSession {
    /// Signed-out session with no default tenant
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// With default scope
    #[inline]
    #[must_use]
    pub fn with_default_scope(mut self, scope: ScopeContext) -> Self {
        self.scope = scope;
        self
    }
}

impl SessionProvider for StaticSession {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn default_scope(&self) -> ScopeContext {
        self.scope.clone()
    }
}
