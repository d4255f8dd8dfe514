//! Proposal aggregation
//!
//! Merges the live interrupt stream (Source A) with persisted pending records
//! (Source B) into one de-duplicated list. The merge itself is the pure
//! [`merge_with`]; [`ProposalAggregator`] adds fetching, scope gating, and the
//! retire set.

use crate::backend::{DecisionBackend, InterruptStream};
use crate::config::{ReviewConfig, DEFAULT_IDENTITY_ARGS, DEFAULT_PENDING_STATUSES};
use crate::error::ReviewError;
use crate::interrupt::Interrupt;
use crate::proposal::{ProposalItem, ProposalStatus};
use crate::record::DecisionRecord;
use crate::scope::{ScopeContext, ScopeHandle, ScopeSnapshot};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Receives lifecycle notifications about listed items
pub trait ProposalSink: Send + Sync + Debug {
    /// Item status changed
    fn status_changed(&self, item_id: &str, status: ProposalStatus);

    /// Item reached a terminal state and should leave the list
    fn retire(&self, item_id: &str);
}

/// One item per action request of every interrupt
#[must_use]
pub fn live_items(interrupts: &[Interrupt], scope: &ScopeContext) -> Vec<ProposalItem> {
    interrupts.iter().flat_map(|i| i.to_items(scope)).collect()
}

/// Reviewable items from persisted records
///
/// Keeps records whose status is one of `pending_statuses` and that nothing
/// superseded, newest first. Repeated ids keep their first occurrence.
#[must_use]
pub fn persisted_items(
    records: &[DecisionRecord],
    scope: &ScopeContext,
    pending_statuses: &[String],
) -> Vec<ProposalItem> {
    let mut kept: Vec<&DecisionRecord> = records
        .iter()
        .filter(|r| !r.is_superseded())
        .filter(|r| pending_statuses.iter().any(|s| s.eq_ignore_ascii_case(&r.status)))
        .collect();
    // Stable: equal timestamps keep backend order; undated records go last
    kept.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut seen = HashSet::new();
    kept.into_iter()
        .filter(|r| seen.insert(r.id.as_str()))
        .map(|r| r.to_item(scope))
        .collect()
}

/// Merge with the default identity argument
#[must_use]
pub fn merge(live: Vec<ProposalItem>, persisted: Vec<ProposalItem>) -> Vec<ProposalItem> {
    let identity_args: Vec<String> = DEFAULT_IDENTITY_ARGS.iter().map(|s| (*s).to_string()).collect();
    merge_with(live, persisted, &identity_args)
}

/// Merge live and persisted items
///
/// Live items are always kept, in order. A persisted item is kept only when
/// no live item shares its identity key and its id is not already listed.
#[must_use]
pub fn merge_with(
    live: Vec<ProposalItem>,
    persisted: Vec<ProposalItem>,
    identity_args: &[String],
) -> Vec<ProposalItem> {
    let mut ids = HashSet::new();
    let mut live_keys = HashSet::new();
    let mut merged = Vec::with_capacity(live.len() + persisted.len());

    for item in live {
        if ids.insert(item.id.clone()) {
            live_keys.insert(item.identity_key(identity_args));
            merged.push(item);
        }
    }
    for item in persisted {
        if live_keys.contains(&item.identity_key(identity_args)) {
            continue;
        }
        if ids.insert(item.id.clone()) {
            merged.push(item);
        }
    }
    merged
}

/// Aggregator tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorSettings {
    /// Bound on each source fetch
    pub request_timeout: Duration,
    /// Merge identity argument names
    pub identity_args: Vec<String>,
    /// Record statuses treated as pending
    pub pending_statuses: Vec<String>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            identity_args: DEFAULT_IDENTITY_ARGS.iter().map(|s| (*s).to_string()).collect(),
            pending_statuses: DEFAULT_PENDING_STATUSES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl From<&ReviewConfig> for AggregatorSettings {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            identity_args: config.identity_args.clone(),
            pending_statuses: config.pending_statuses.clone(),
        }
    }
}

/// Keeps the merged proposal list for the active scope
#[derive(Debug)]
pub struct ProposalAggregator {
    backend: Arc<dyn DecisionBackend>,
    stream: Arc<dyn InterruptStream>,
    scope: ScopeHandle,
    settings: AggregatorSettings,
    items: RwLock<Vec<ProposalItem>>,
    retired: Mutex<HashSet<String>>,
}

impl ProposalAggregator {
    /// Create aggregator
    #[must_use]
    pub fn new(
        backend: Arc<dyn DecisionBackend>,
        stream: Arc<dyn InterruptStream>,
        scope: ScopeHandle,
    ) -> Self {
        Self {
            backend,
            stream,
            scope,
            settings: AggregatorSettings::default(),
            items: RwLock::new(Vec::new()),
            retired: Mutex::new(HashSet::new()),
        }
    }

    /// With settings
    #[inline]
    #[must_use]
    pub fn with_settings(mut self, settings: AggregatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Re-read both sources and rebuild the list
    ///
    /// Source failures degrade to an empty source. If the scope changes
    /// while fetching, the result is discarded and the previous list kept.
    pub async fn refresh(&self) -> Vec<ProposalItem> {
        let snapshot = self.scope.snapshot();
        let (interrupts, records) =
            tokio::join!(self.fetch_live(&snapshot), self.fetch_persisted(&snapshot));

        if !snapshot.is_current() {
            tracing::debug!("scope changed during refresh; discarding result");
            return self.items();
        }

        let merged = merge_with(
            live_items(&interrupts, &snapshot.context),
            persisted_items(&records, &snapshot.context, &self.settings.pending_statuses),
            &self.settings.identity_args,
        );
        let in_flight: HashSet<String> = self
            .items
            .read()
            .iter()
            .filter(|i| i.status == ProposalStatus::Processing)
            .map(|i| i.id.clone())
            .collect();
        let visible: Vec<ProposalItem> = self
            .hide_retired(merged)
            .into_iter()
            .map(|mut item| {
                if in_flight.contains(&item.id) {
                    item.status = ProposalStatus::Processing;
                }
                item
            })
            .collect();

        tracing::info!(
            org_id = snapshot.context.org_id.as_deref().unwrap_or("-"),
            project_id = snapshot.context.project_id.as_deref().unwrap_or("-"),
            live = interrupts.len(),
            persisted = records.len(),
            listed = visible.len(),
            "refreshed proposals"
        );
        self.items.write().clone_from(&visible);
        visible
    }

    /// Fetch Source B, reporting why it is empty
    ///
    /// # Errors
    /// - [`ReviewError::ScopeUnresolved`] without issuing a request
    /// - [`ReviewError::SourceFetchFailed`] on backend error
    /// - [`ReviewError::Timeout`] when the fetch outlives the request timeout
    /// - [`ReviewError::Cancelled`] when the scope changes mid-flight
    pub async fn try_fetch_persisted(
        &self,
        snapshot: &ScopeSnapshot,
    ) -> Result<Vec<DecisionRecord>, ReviewError> {
        let scope = snapshot.require_resolved()?;
        let limit = self.settings.request_timeout;

        tokio::select! {
            _ = snapshot.token.cancelled() => Err(ReviewError::Cancelled),
            result = tokio::time::timeout(limit, self.backend.list_pending_decisions(scope)) => {
                match result {
                    Ok(Ok(records)) => Ok(records),
                    Ok(Err(err)) => Err(ReviewError::SourceFetchFailed(err.to_string())),
                    Err(_) => Err(ReviewError::Timeout {
                        duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    }),
                }
            }
        }
    }

    async fn fetch_persisted(&self, snapshot: &ScopeSnapshot) -> Vec<DecisionRecord> {
        match self.try_fetch_persisted(snapshot).await {
            Ok(records) => records,
            Err(ReviewError::ScopeUnresolved) => {
                tracing::debug!("no scope resolved; skipping persisted decisions");
                Vec::new()
            }
            Err(ReviewError::Cancelled) => Vec::new(),
            Err(err) => {
                tracing::warn!(
                    org_id = snapshot.context.org_id.as_deref().unwrap_or("-"),
                    project_id = snapshot.context.project_id.as_deref().unwrap_or("-"),
                    error = %err,
                    "persisted decisions unavailable; listing live proposals only"
                );
                Vec::new()
            }
        }
    }

    async fn fetch_live(&self, snapshot: &ScopeSnapshot) -> Vec<Interrupt> {
        let limit = self.settings.request_timeout;
        tokio::select! {
            _ = snapshot.token.cancelled() => Vec::new(),
            result = tokio::time::timeout(limit, self.stream.current_interrupts()) => match result {
                Ok(Ok(interrupts)) => interrupts,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "interrupt stream unavailable");
                    Vec::new()
                }
                Err(_) => {
                    tracing::warn!(timeout_ms = limit.as_millis(), "interrupt stream timed out");
                    Vec::new()
                }
            },
        }
    }

    /// Drop retired ids from `merged` and forget ids gone from both sources
    fn hide_retired(&self, merged: Vec<ProposalItem>) -> Vec<ProposalItem> {
        let mut retired = self.retired.lock();
        let present: HashSet<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        retired.retain(|id| present.contains(id.as_str()));
        drop(present);
        merged.into_iter().filter(|i| !retired.contains(&i.id)).collect()
    }

    /// Current list
    #[must_use]
    pub fn items(&self) -> Vec<ProposalItem> {
        self.items.read().clone()
    }

    /// Look up a listed item
    #[must_use]
    pub fn get(&self, item_id: &str) -> Option<ProposalItem> {
        self.items.read().iter().find(|i| i.id == item_id).cloned()
    }

    /// Look up a listed item or fail
    ///
    /// # Errors
    /// Returns [`ReviewError::UnknownItem`] if the id is not listed.
    pub fn require(&self, item_id: &str) -> Result<ProposalItem, ReviewError> {
        self.get(item_id)
            .ok_or_else(|| ReviewError::UnknownItem(item_id.to_string()))
    }

    /// Items still awaiting a decision
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.items
            .read()
            .iter()
            .filter(|i| !i.status.is_terminal())
            .count()
    }

    /// Check if an id is hidden by the retire set
    #[must_use]
    pub fn is_retired(&self, item_id: &str) -> bool {
        self.retired.lock().contains(item_id)
    }

    /// Ids a source still reports: listed items plus retired ones
    #[must_use]
    pub fn reported_ids(&self) -> HashSet<String> {
        let mut ids: HashSet<String> = self.items.read().iter().map(|i| i.id.clone()).collect();
        ids.extend(self.retired.lock().iter().cloned());
        ids
    }
}

impl ProposalSink for ProposalAggregator {
    fn status_changed(&self, item_id: &str, status: ProposalStatus) {
        if let Some(item) = self.items.write().iter_mut().find(|i| i.id == item_id) {
            item.status = status;
        }
    }

    fn retire(&self, item_id: &str) {
        self.retired.lock().insert(item_id.to_string());
        self.items.write().retain(|i| i.id != item_id);
        tracing::debug!(item_id, "retired proposal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::ActionRequest;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn scope() -> ScopeContext {
        ScopeContext::new(Some("o1"), Some("p1"))
    }

    fn statuses() -> Vec<String> {
        vec!["pending".into(), "proposed".into()]
    }

    fn ids(items: &[ProposalItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn superseded_records_are_excluded() {
        let records = vec![
            DecisionRecord::new("r1", "classify_intent", "pending"),
            DecisionRecord::new("r1", "classify_intent", "pending").with_superseded_by("r2"),
        ];
        let items = persisted_items(&records, &scope(), &statuses());
        assert_eq!(ids(&items), vec!["r1"]);
    }

    #[test]
    fn only_pending_statuses() {
        let records = vec![
            DecisionRecord::new("a", "x", "approved"),
            DecisionRecord::new("b", "x", "PROPOSED"),
            DecisionRecord::new("c", "x", "pending"),
        ];
        assert_eq!(ids(&persisted_items(&records, &scope(), &statuses())), vec!["b", "c"]);
    }

    #[test]
    fn newest_first() {
        let at = |h| Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap();
        let records = vec![
            DecisionRecord::new("old", "x", "pending").with_created_at(at(8)),
            DecisionRecord::new("undated", "x", "pending"),
            DecisionRecord::new("new", "x", "pending").with_created_at(at(12)),
        ];
        assert_eq!(
            ids(&persisted_items(&records, &scope(), &statuses())),
            vec!["new", "old", "undated"]
        );
    }

    #[test]
    fn live_wins_on_identity() {
        let live = live_items(
            &[Interrupt::new(
                "i1",
                vec![ActionRequest::new("classify_intent").with_arg("trigger_id", "t1")],
            )],
            &scope(),
        );
        let persisted = vec![
            DecisionRecord::new("r1", "classify_intent", "pending")
                .with_inputs(live[0].payload.args.clone())
                .to_item(&scope()),
            DecisionRecord::new("r2", "classify_intent", "pending").to_item(&scope()),
        ];

        let merged = merge(live, persisted);
        assert_eq!(ids(&merged), vec!["i1-0", "r2"]);
        assert!(merged[0].is_live());
    }

    #[test]
    fn same_trigger_different_type_is_kept() {
        let live = live_items(
            &[Interrupt::new(
                "i1",
                vec![ActionRequest::new("classify_intent").with_arg("trigger_id", "t1")],
            )],
            &scope(),
        );
        let persisted = vec![DecisionRecord::new("r1", "generate_concept_brief", "pending")
            .with_inputs(live[0].payload.args.clone())
            .to_item(&scope())];
        assert_eq!(merge(live, persisted).len(), 2);
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let item = DecisionRecord::new("r1", "x", "pending").to_item(&scope());
        let other = DecisionRecord::new("r1", "y", "pending").to_item(&scope());
        let merged = merge(Vec::new(), vec![item, other]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].proposal_type, "x");
    }
}
