//! Scope resolution
//!
//! Precedence, highest first: ids in the route (canonical or legacy), the
//! persisted fallback, the session's default tenant. A lower source only
//! supplies a project when it agrees with the organization already chosen,
//! so a project id is never paired with a foreign organization.

use super::route::{parse_route, RouteScope};
use super::session::SessionProvider;
use super::store::{ChangeOrigin, FallbackStore};
use super::ScopeContext;
use crate::config::FallbackKeys;
use std::sync::Arc;

/// Resolves the active [`ScopeContext`]
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    store: Arc<dyn FallbackStore>,
    session: Option<Arc<dyn SessionProvider>>,
    keys: FallbackKeys,
}

impl ScopeResolver {
    /// Create resolver over a fallback store
    #[must_use]
    pub fn new(store: Arc<dyn FallbackStore>) -> Self {
        Self {
            store,
            session: None,
            keys: FallbackKeys::default(),
        }
    }

    /// With session provider for the last-resort default
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    /// With fallback keys
    #[inline]
    #[must_use]
    pub fn with_keys(mut self, keys: FallbackKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Fallback store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn FallbackStore> {
        &self.store
    }

    /// Fallback keys
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &FallbackKeys {
        &self.keys
    }

    /// Resolve without side effects
    #[must_use]
    pub fn resolve(&self, route: Option<&str>) -> ScopeContext {
        let from_route = route.map(parse_route).unwrap_or_default();
        let persisted = ScopeContext {
            org_id: self.store.get(&self.keys.org_key),
            project_id: self.store.get(&self.keys.project_key),
        };
        let session = self
            .session
            .as_ref()
            .map(|s| s.default_scope())
            .unwrap_or_default();

        let route_scope = ScopeContext::new(from_route.org_id(), from_route.project_id());
        let mut scope = route_scope;
        for lower in [persisted, session] {
            scope = layer(scope, lower);
        }
        scope
    }

    /// Resolve and write route-derived ids back to the fallback store
    pub fn resolve_and_remember(&self, route: Option<&str>) -> ScopeContext {
        let scope = self.resolve(route);
        if let Some(route) = route {
            self.remember(&parse_route(route));
        }
        scope
    }

    fn remember(&self, route: &RouteScope) {
        let writes = [
            (&self.keys.org_key, route.org_id()),
            (&self.keys.project_key, route.project_id()),
        ];
        for (key, value) in writes {
            let Some(value) = value else { continue };
            if let Err(err) = self.store.set(key, Some(value), ChangeOrigin::Route) {
                tracing::warn!(key = %key, error = %err, "failed to persist route scope");
            }
        }
    }
}

/// Fill gaps in `upper` from `lower`
fn layer(upper: ScopeContext, lower: ScopeContext) -> ScopeContext {
    match upper.org_id {
        None => ScopeContext {
            org_id: lower.org_id,
            project_id: upper.project_id.or(lower.project_id),
        },
        Some(org) => {
            let same_org = lower.org_id.as_deref() == Some(org.as_str());
            let project_id = upper
                .project_id
                .or_else(|| lower.project_id.filter(|_| same_org));
            ScopeContext {
                org_id: Some(org),
                project_id,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{MemoryFallbackStore, StaticSession};

    fn resolver(values: &[(&str, &str)]) -> ScopeResolver {
        let store = MemoryFallbackStore::with_values(values.iter().copied());
        ScopeResolver::new(Arc::new(store))
    }

    #[test]
    fn route_wins_over_fallback() {
        let r = resolver(&[("hitl.org_id", "o9"), ("hitl.project_id", "p9")]);
        assert_eq!(
            r.resolve(Some("/org/acme/o1/project/atlas/p1")),
            ScopeContext::new(Some("o1"), Some("p1"))
        );
    }

    #[test]
    fn fallback_when_route_is_empty() {
        let r = resolver(&[("hitl.org_id", "o9"), ("hitl.project_id", "p9")]);
        assert_eq!(r.resolve(Some("/settings")), ScopeContext::new(Some("o9"), Some("p9")));
        assert_eq!(r.resolve(None), ScopeContext::new(Some("o9"), Some("p9")));
    }

    #[test]
    fn foreign_fallback_project_is_not_borrowed() {
        let r = resolver(&[("hitl.org_id", "o9"), ("hitl.project_id", "p9")]);
        assert_eq!(r.resolve(Some("/org/o1")), ScopeContext::new(Some("o1"), None));
    }

    #[test]
    fn same_org_fallback_project_is_borrowed() {
        let r = resolver(&[("hitl.org_id", "o1"), ("hitl.project_id", "p1")]);
        assert_eq!(r.resolve(Some("/org/o1")), ScopeContext::new(Some("o1"), Some("p1")));
    }

    #[test]
    fn session_default_is_last_resort() {
        let session = StaticSession::anonymous()
            .with_default_scope(ScopeContext::new(Some("home"), Some("hp")));
        let r = resolver(&[]).with_session(Arc::new(session));
        assert_eq!(r.resolve(None), ScopeContext::new(Some("home"), Some("hp")));

        let r = resolver(&[("hitl.org_id", "o1")]).with_session(Arc::new(
            StaticSession::anonymous().with_default_scope(ScopeContext::new(Some("home"), Some("hp"))),
        ));
        assert_eq!(r.resolve(None), ScopeContext::new(Some("o1"), None));
    }

    #[test]
    fn nothing_resolvable() {
        assert_eq!(resolver(&[]).resolve(Some("/")), ScopeContext::unresolved());
    }

    #[test]
    fn route_values_written_back() {
        let r = resolver(&[]);
        let mut rx = r.store().subscribe();
        r.resolve_and_remember(Some("/org/acme/o1/project/p1"));

        assert_eq!(r.store().get("hitl.org_id").as_deref(), Some("o1"));
        assert_eq!(r.store().get("hitl.project_id").as_deref(), Some("p1"));
        // Route write-back is not an out-of-band change
        assert!(rx.try_recv().is_err());
    }
}
