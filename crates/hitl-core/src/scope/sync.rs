//! Scope synchronization
//!
//! [`ScopeSynchronizer`] is the only writer of the active scope. Readers hold
//! a [`ScopeHandle`] and capture a [`ScopeSnapshot`] at operation start; the
//! snapshot's token is cancelled as soon as the scope moves on.

use super::resolver::ScopeResolver;
use super::ScopeContext;
use crate::error::ReviewError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Scope captured at operation start
#[derive(Debug, Clone)]
pub struct ScopeSnapshot {
    /// Scope at capture time
    pub context: ScopeContext,
    /// Cancelled when the scope changes or the region unmounts
    pub token: CancellationToken,
    /// Incremented on every scope change
    pub generation: u64,
}

impl ScopeSnapshot {
    fn initial() -> Self {
        Self {
            context: ScopeContext::unresolved(),
            token: CancellationToken::new(),
            generation: 0,
        }
    }

    /// Check that the scope has not moved since capture
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Borrow the context, refusing an unresolved one
    ///
    /// # Errors
    /// Returns [`ReviewError::ScopeUnresolved`] when neither id is known.
    pub fn require_resolved(&self) -> Result<&ScopeContext, ReviewError> {
        if self.context.is_resolved() {
            Ok(&self.context)
        } else {
            Err(ReviewError::ScopeUnresolved)
        }
    }
}

/// Read side of the active scope
#[derive(Debug, Clone)]
pub struct ScopeHandle {
    rx: watch::Receiver<ScopeSnapshot>,
}

impl ScopeHandle {
    /// Handle pinned to a fixed scope, with no synchronizer behind it
    #[must_use]
    pub fn fixed(context: ScopeContext) -> Self {
        let (_tx, rx) = watch::channel(ScopeSnapshot {
            context,
            token: CancellationToken::new(),
            generation: 0,
        });
        Self { rx }
    }

    /// Capture the live scope
    #[must_use]
    pub fn snapshot(&self) -> ScopeSnapshot {
        self.rx.borrow().clone()
    }

    /// Live scope context
    #[must_use]
    pub fn context(&self) -> ScopeContext {
        self.rx.borrow().context.clone()
    }

    /// Wait for the next scope change
    ///
    /// Returns `false` once the synchronizer is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Single writer of the active scope
#[derive(Debug)]
pub struct ScopeSynchronizer {
    resolver: ScopeResolver,
    tx: watch::Sender<ScopeSnapshot>,
    route: Mutex<Option<String>>,
    mounted: Mutex<Option<CancellationToken>>,
}

impl ScopeSynchronizer {
    /// Create synchronizer; the scope is unresolved until [`Self::mount`]
    #[must_use]
    pub fn new(resolver: ScopeResolver) -> Self {
        let (tx, _) = watch::channel(ScopeSnapshot::initial());
        Self {
            resolver,
            tx,
            route: Mutex::new(None),
            mounted: Mutex::new(None),
        }
    }

    /// Create a read handle
    #[must_use]
    pub fn handle(&self) -> ScopeHandle {
        ScopeHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// Resolver in use
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    /// Enter the scoped region
    pub fn mount(&self, route: Option<&str>) -> ScopeContext {
        {
            let mut mounted = self.mounted.lock();
            if mounted.is_none() {
                *mounted = Some(CancellationToken::new());
            }
        }
        self.navigate_opt(route)
    }

    /// Route changed
    pub fn navigate(&self, route: &str) -> ScopeContext {
        self.navigate_opt(Some(route))
    }

    fn navigate_opt(&self, route: Option<&str>) -> ScopeContext {
        *self.route.lock() = route.map(str::to_string);
        if !self.is_mounted() {
            return ScopeContext::unresolved();
        }
        let context = self.resolver.resolve_and_remember(route);
        self.publish(context.clone());
        context
    }

    /// Recompute from the current route, e.g. after a fallback change
    pub fn refresh(&self) -> ScopeContext {
        if !self.is_mounted() {
            return ScopeContext::unresolved();
        }
        let route = self.route.lock().clone();
        let context = self.resolver.resolve(route.as_deref());
        self.publish(context.clone());
        context
    }

    /// Leave the scoped region: reset to unresolved and cancel in-flight work
    pub fn unmount(&self) {
        if let Some(lifetime) = self.mounted.lock().take() {
            lifetime.cancel();
        }
        *self.route.lock() = None;
        self.publish(ScopeContext::unresolved());
    }

    /// Check if the region is mounted
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.lock().is_some()
    }

    /// Recompute whenever the fallback store changes out of band
    ///
    /// The task ends on unmount or when the store goes away.
    pub fn spawn_fallback_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut changes = self.resolver.store().subscribe();
        let lifetime = self
            .mounted
            .lock()
            .clone()
            .unwrap_or_else(|| {
                let token = CancellationToken::new();
                token.cancel();
                token
            });

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = lifetime.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(change) => {
                            tracing::debug!(key = %change.key, "fallback changed out of band");
                            this.refresh();
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "fallback listener lagged");
                            this.refresh();
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    fn publish(&self, context: ScopeContext) {
        self.tx.send_if_modified(|current| {
            if current.context == context {
                return false;
            }
            current.token.cancel();
            tracing::info!(
                org_id = context.org_id.as_deref().unwrap_or("-"),
                project_id = context.project_id.as_deref().unwrap_or("-"),
                "active scope changed"
            );
            *current = ScopeSnapshot {
                context,
                token: CancellationToken::new(),
                generation: current.generation + 1,
            };
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{ChangeOrigin, FallbackStore, MemoryFallbackStore};

    fn synchronizer() -> (Arc<MemoryFallbackStore>, Arc<ScopeSynchronizer>) {
        let store = Arc::new(MemoryFallbackStore::new());
        let resolver = ScopeResolver::new(Arc::clone(&store) as Arc<dyn FallbackStore>);
        (store, Arc::new(ScopeSynchronizer::new(resolver)))
    }

    #[test]
    fn unresolved_until_mounted() {
        let (_store, sync) = synchronizer();
        assert_eq!(sync.navigate("/org/o1"), ScopeContext::unresolved());
        assert_eq!(sync.handle().context(), ScopeContext::unresolved());

        sync.mount(Some("/org/o1"));
        assert_eq!(sync.handle().context(), ScopeContext::new(Some("o1"), None));
    }

    #[test]
    fn scope_change_cancels_previous_snapshot() {
        let (_store, sync) = synchronizer();
        sync.mount(Some("/org/o1"));
        let handle = sync.handle();
        let before = handle.snapshot();

        sync.navigate("/org/o1");
        assert!(before.is_current(), "same scope keeps the token");

        sync.navigate("/org/o2");
        assert!(!before.is_current());
        let after = handle.snapshot();
        assert!(after.is_current());
        assert_eq!(after.generation, before.generation + 1);
    }

    #[test]
    fn unmount_resets_and_cancels() {
        let (_store, sync) = synchronizer();
        sync.mount(Some("/org/o1/project/p1"));
        let snapshot = sync.handle().snapshot();

        sync.unmount();
        assert!(!snapshot.is_current());
        assert!(!sync.is_mounted());
        assert_eq!(sync.handle().context(), ScopeContext::unresolved());
        assert!(matches!(
            sync.handle().snapshot().require_resolved(),
            Err(ReviewError::ScopeUnresolved)
        ));
    }

    #[tokio::test]
    async fn out_of_band_change_recomputes() {
        let (store, sync) = synchronizer();
        sync.mount(None);
        let listener = sync.spawn_fallback_listener();
        let mut handle = sync.handle();

        store.set("hitl.org_id", Some("o7"), ChangeOrigin::External).unwrap();
        assert!(handle.changed().await);
        assert_eq!(handle.context(), ScopeContext::new(Some("o7"), None));

        sync.unmount();
        listener.await.unwrap();
    }

    #[test]
    fn fixed_handle() {
        let handle = ScopeHandle::fixed(ScopeContext::new(Some("o1"), Some("p1")));
        assert!(handle.snapshot().require_resolved().is_ok());
    }
}
