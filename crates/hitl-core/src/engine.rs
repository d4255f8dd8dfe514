//! Review engine
//!
//! Wires scope synchronization, aggregation, rendering and the decision
//! lifecycle over one pair of backend collaborators.

use crate::aggregator::{AggregatorSettings, ProposalAggregator, ProposalSink};
use crate::backend::{DecisionBackend, InterruptStream};
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::lifecycle::{Decision, DecisionLifecycle, DecisionOutcome, LifecycleSettings, SessionState};
use crate::preview::render_item;
use crate::proposal::{ProposalItem, ProposalStatus};
use crate::scope::{ScopeContext, ScopeHandle, ScopeResolver, ScopeSynchronizer};
use hitl_render::{RendererRegistry, View};
use std::sync::Arc;

/// The review surface's engine
#[derive(Debug)]
pub struct ReviewEngine {
    config: ReviewConfig,
    scope: Arc<ScopeSynchronizer>,
    aggregator: Arc<ProposalAggregator>,
    lifecycle: DecisionLifecycle,
    renderers: RendererRegistry,
}

impl ReviewEngine {
    /// Create engine
    ///
    /// The resolver's fallback keys are taken from `config`.
    #[must_use]
    pub fn new(
        config: ReviewConfig,
        backend: Arc<dyn DecisionBackend>,
        stream: Arc<dyn InterruptStream>,
        resolver: ScopeResolver,
    ) -> Self {
        let scope = Arc::new(ScopeSynchronizer::new(
            resolver.with_keys(config.fallback.clone()),
        ));
        let aggregator = Arc::new(
            ProposalAggregator::new(Arc::clone(&backend), Arc::clone(&stream), scope.handle())
                .with_settings(AggregatorSettings::from(&config)),
        );
        let lifecycle = DecisionLifecycle::new(backend, stream, scope.handle())
            .with_settings(LifecycleSettings::from(&config))
            .with_sink(Arc::clone(&aggregator) as Arc<dyn ProposalSink>);

        Self {
            config,
            scope,
            aggregator,
            lifecycle,
            renderers: RendererRegistry::with_defaults(),
        }
    }

    /// With a custom renderer registry
    #[inline]
    #[must_use]
    pub fn with_renderers(mut self, renderers: RendererRegistry) -> Self {
        self.renderers = renderers;
        self
    }

    /// Enter the scoped region at `route`
    pub fn mount(&self, route: Option<&str>) -> ScopeContext {
        self.scope.mount(route)
    }

    /// Leave the scoped region
    pub fn unmount(&self) {
        self.scope.unmount();
    }

    /// Scope synchronizer
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &Arc<ScopeSynchronizer> {
        &self.scope
    }

    /// New read handle on the active scope
    #[must_use]
    pub fn scope_handle(&self) -> ScopeHandle {
        self.scope.handle()
    }

    /// Re-read both sources
    ///
    /// Settled items that neither source reports any more are dropped from
    /// lifecycle tracking.
    pub async fn refresh(&self) -> Vec<ProposalItem> {
        let items = self.aggregator.refresh().await;
        let reported = self.aggregator.reported_ids();
        self.lifecycle.prune(|id| reported.contains(id));
        items
    }

    /// Listed items
    #[must_use]
    pub fn items(&self) -> Vec<ProposalItem> {
        self.aggregator.items()
    }

    /// Items awaiting a decision
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.aggregator.pending_count()
    }

    /// Render a listed item
    ///
    /// # Errors
    /// Returns [`ReviewError::UnknownItem`] if the id is not listed.
    pub fn preview(&self, item_id: &str) -> Result<View, ReviewError> {
        let item = self.aggregator.require(item_id)?;
        Ok(render_item(&self.renderers, &item))
    }

    /// Decide on a listed item
    ///
    /// # Errors
    /// Returns [`ReviewError::UnknownItem`] if the id is not listed, otherwise
    /// whatever [`DecisionLifecycle::decide`] returns.
    pub async fn decide(&self, item_id: &str, decision: Decision) -> Result<DecisionOutcome, ReviewError> {
        let item = self.aggregator.require(item_id)?;
        self.lifecycle.decide(&item, decision).await
    }

    /// Tracked status of an item
    #[must_use]
    pub fn status(&self, item_id: &str) -> Option<ProposalStatus> {
        self.lifecycle
            .status(item_id)
            .or_else(|| self.aggregator.get(item_id).map(|i| i.status))
    }

    /// Session state accumulated from apply responses
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.lifecycle.session()
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Aggregator
    #[inline]
    #[must_use]
    pub fn aggregator(&self) -> &Arc<ProposalAggregator> {
        &self.aggregator
    }

    /// Lifecycle
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> &DecisionLifecycle {
        &self.lifecycle
    }

    /// Renderer registry
    #[inline]
    #[must_use]
    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }
}
