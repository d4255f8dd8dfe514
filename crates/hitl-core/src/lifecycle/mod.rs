//! Decision lifecycle
//!
//! Per-item state machine `Pending -> Processing -> {Approved, Rejected}`
//! with the backend apply protocol:
//!
//! - the `Pending -> Processing` step happens before any await, so a second
//!   decision on the same item observes `Processing` and becomes a no-op
//! - leaving `Pending` requires the item's scope to equal the active scope
//! - failures roll back to `Pending` and surface the backend message verbatim
//! - terminal decisions persist an audit record whichever path applied them

mod session;
mod state_machine;

pub use session::SessionState;
pub use state_machine::{allowed_transitions, validate_transition};

use crate::aggregator::ProposalSink;
use crate::backend::{ApplyItem, ApplyRequest, ApplyResponse, ApplyStatus, DecisionBackend, InterruptStream};
use crate::config::{ReviewConfig, DEFAULT_PREVIEW_ONLY_TYPES};
use crate::error::ReviewError;
use crate::interrupt::{DecisionType, ResumeDecision, ResumePayload};
use crate::proposal::{Args, ProposalItem, ProposalOrigin, ProposalStatus};
use crate::record::DecisionRecord;
use crate::scope::{ScopeContext, ScopeHandle, ScopeSnapshot};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Reviewer action
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Approve, optionally with edited arguments
    Approve {
        /// Replacement arguments
        edited_args: Option<Args>,
    },
    /// Reject
    Reject {
        /// Reason shown to the agent
        reason: Option<String>,
    },
    /// Open the arguments for editing; the item stays pending
    Edit,
}

impl Decision {
    /// Approve as proposed
    #[inline]
    #[must_use]
    pub fn approve() -> Self {
        Self::Approve { edited_args: None }
    }

    /// Approve with edited arguments
    #[inline]
    #[must_use]
    pub fn approve_with(args: Args) -> Self {
        Self::Approve {
            edited_args: Some(args),
        }
    }

    /// Reject without a reason
    #[inline]
    #[must_use]
    pub fn reject() -> Self {
        Self::Reject { reason: None }
    }

    /// Reject with a reason
    #[inline]
    #[must_use]
    pub fn reject_because(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: Some(reason.into()),
        }
    }

    fn effective_args(&self, item: &ProposalItem) -> Args {
        match self {
            Self::Approve {
                edited_args: Some(args),
            } => args.clone(),
            _ => item.payload.args.clone(),
        }
    }

    fn resume_decision(&self) -> ResumeDecision {
        match self {
            Self::Approve { edited_args: None } => ResumeDecision {
                decision_type: DecisionType::Approve,
                args: None,
            },
            Self::Approve {
                edited_args: Some(args),
            } => ResumeDecision {
                decision_type: DecisionType::Edit,
                args: Some(args.clone()),
            },
            Self::Reject { reason } => ResumeDecision {
                decision_type: DecisionType::Reject,
                args: reason.as_ref().map(|r| {
                    let mut args = Args::new();
                    args.insert("reason".to_string(), Value::String(r.clone()));
                    args
                }),
            },
            Self::Edit => ResumeDecision {
                decision_type: DecisionType::Edit,
                args: None,
            },
        }
    }
}

/// Apply protocol a proposal goes through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyFamily {
    /// Scoped apply endpoint; response deltas feed [`SessionState`]
    ScopedApply,
    /// Resume the originating interrupt
    InterruptResume {
        /// Interrupt id
        interrupt_id: String,
        /// Action request index
        request_index: usize,
    },
}

/// Editable view opened by [`Decision::Edit`]
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    /// Item being edited
    pub item_id: String,
    /// Proposal type
    pub proposal_type: String,
    /// Arguments to edit
    pub args: Args,
    /// Preview data, for context
    pub preview_data: Option<Value>,
}

/// Result of a decision
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    /// Reached a terminal status
    Decided {
        /// Item id
        item_id: String,
        /// `Approved` or `Rejected`
        status: ProposalStatus,
        /// Whether the audit record was stored
        record_persisted: bool,
        /// Backend message, if any
        message: Option<String>,
    },
    /// Edit view opened; no backend call was made
    Editing(EditSession),
    /// A decision for this item is already being applied
    InFlight {
        /// Item id
        item_id: String,
    },
}

/// Lifecycle tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Bound on one apply call
    pub apply_timeout: Duration,
    /// Types routed through the scoped apply endpoint
    pub preview_only_types: HashSet<String>,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            apply_timeout: Duration::from_secs(30),
            preview_only_types: DEFAULT_PREVIEW_ONLY_TYPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl From<&ReviewConfig> for LifecycleSettings {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            apply_timeout: config.apply_timeout(),
            preview_only_types: config.preview_only_set(),
        }
    }
}

#[derive(Debug)]
struct Tracked {
    status: ProposalStatus,
    history: Vec<ProposalStatus>,
}

impl Tracked {
    fn new(status: ProposalStatus) -> Self {
        Self {
            status,
            history: vec![status],
        }
    }

    fn transition(&mut self, to: ProposalStatus) -> Result<(), ReviewError> {
        validate_transition(self.status, to)?;
        self.status = to;
        self.history.push(to);
        Ok(())
    }
}

/// Applies reviewer decisions
#[derive(Debug)]
pub struct DecisionLifecycle {
    backend: Arc<dyn DecisionBackend>,
    stream: Arc<dyn InterruptStream>,
    scope: ScopeHandle,
    sink: Option<Arc<dyn ProposalSink>>,
    settings: LifecycleSettings,
    states: DashMap<String, Tracked>,
    session: RwLock<SessionState>,
}

impl DecisionLifecycle {
    /// Create lifecycle
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
            sink: None,
            settings: LifecycleSettings::default(),
            states: DashMap::new(),
            session: RwLock::new(SessionState::default()),
        }
    }

    /// With settings
    #[inline]
    #[must_use]
    pub fn with_settings(mut self, settings: LifecycleSettings) -> Self {
        self.settings = settings;
        self
    }

    /// With a sink notified of status changes and retirements
    #[inline]
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProposalSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Tracked status of an item
    #[must_use]
    pub fn status(&self, item_id: &str) -> Option<ProposalStatus> {
        self.states.get(item_id).map(|t| t.status)
    }

    /// Every status an item has been observed in, oldest first
    #[must_use]
    pub fn history(&self, item_id: &str) -> Vec<ProposalStatus> {
        self.states
            .get(item_id)
            .map(|t| t.history.clone())
            .unwrap_or_default()
    }

    /// Number of items with tracked status
    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.states.len()
    }

    /// Forget settled items no source reports any more
    ///
    /// Entries still `Pending` or `Processing` are kept regardless. Returns
    /// the number of entries dropped.
    pub fn prune(&self, still_reported: impl Fn(&str) -> bool) -> usize {
        let before = self.states.len();
        self.states
            .retain(|id, tracked| !tracked.status.is_terminal() || still_reported(id));
        let pruned = before.saturating_sub(self.states.len());
        if pruned > 0 {
            tracing::debug!(pruned, tracked = self.states.len(), "forgot settled proposals");
        }
        pruned
    }

    /// Session state accumulated from apply responses
    #[must_use]
    pub fn session(&self) -> SessionState {
        self.session.read().clone()
    }

    /// Apply protocol for an item
    ///
    /// Preview-only types and items with no interrupt to resume use the
    /// scoped apply endpoint.
    #[must_use]
    pub fn family_for(&self, item: &ProposalItem) -> ApplyFamily {
        if self.settings.preview_only_types.contains(&item.proposal_type) {
            return ApplyFamily::ScopedApply;
        }
        match &item.origin {
            ProposalOrigin::Interrupt {
                interrupt_id,
                request_index,
            } => ApplyFamily::InterruptResume {
                interrupt_id: interrupt_id.clone(),
                request_index: *request_index,
            },
            ProposalOrigin::Persisted { .. } => ApplyFamily::ScopedApply,
        }
    }

    /// Decide on an item
    ///
    /// # Errors
    /// - [`ReviewError::AlreadyDecided`] if the item is terminal
    /// - [`ReviewError::ScopeUnresolved`] / [`ReviewError::ScopeMismatch`] from the tenant guard
    /// - [`ReviewError::ApplyFailed`] if the backend refused; the item is pending again
    /// - [`ReviewError::Timeout`] / [`ReviewError::Cancelled`] likewise roll back
    pub async fn decide(
        &self,
        item: &ProposalItem,
        decision: Decision,
    ) -> Result<DecisionOutcome, ReviewError> {
        let snapshot = self.scope.snapshot();

        let current = self.status(&item.id).unwrap_or(item.status);
        if current == ProposalStatus::Processing {
            tracing::debug!(item_id = %item.id, "decision already in flight");
            return Ok(DecisionOutcome::InFlight {
                item_id: item.id.clone(),
            });
        }
        if current.is_terminal() {
            return Err(ReviewError::AlreadyDecided {
                item_id: item.id.clone(),
                status: current,
            });
        }

        Self::check_scope(item, &snapshot)?;

        let target = match &decision {
            Decision::Edit => {
                tracing::debug!(item_id = %item.id, "opening edit view");
                return Ok(DecisionOutcome::Editing(EditSession {
                    item_id: item.id.clone(),
                    proposal_type: item.proposal_type.clone(),
                    args: item.payload.args.clone(),
                    preview_data: item.payload.preview_data.clone(),
                }));
            }
            Decision::Approve { .. } => ProposalStatus::Approved,
            Decision::Reject { .. } => ProposalStatus::Rejected,
        };

        if !self.begin(item)? {
            return Ok(DecisionOutcome::InFlight {
                item_id: item.id.clone(),
            });
        }
        self.notify(&item.id, ProposalStatus::Processing);

        let family = self.family_for(item);
        tracing::info!(
            item_id = %item.id,
            proposal_type = %item.proposal_type,
            org_id = snapshot.context.org_id.as_deref().unwrap_or("-"),
            project_id = snapshot.context.project_id.as_deref().unwrap_or("-"),
            decision = %target,
            family = ?family,
            "applying decision"
        );

        match self.apply_guarded(&family, item, &decision, target, &snapshot).await {
            Ok(response) => {
                self.transition(&item.id, target)?;
                if let Some(response) = &response {
                    self.session.write().merge(response);
                }
                let record_persisted = self
                    .persist_record(item, &decision, target, &snapshot.context)
                    .await;

                self.notify(&item.id, target);
                if let Some(sink) = &self.sink {
                    sink.retire(&item.id);
                }
                Ok(DecisionOutcome::Decided {
                    item_id: item.id.clone(),
                    status: target,
                    record_persisted,
                    message: response.and_then(|r| r.message),
                })
            }
            Err(err) => {
                self.transition(&item.id, ProposalStatus::Pending)?;
                self.notify(&item.id, ProposalStatus::Pending);
                tracing::warn!(
                    item_id = %item.id,
                    proposal_type = %item.proposal_type,
                    error = %err,
                    "decision failed; item is pending again"
                );
                Err(err)
            }
        }
    }

    fn check_scope(item: &ProposalItem, snapshot: &ScopeSnapshot) -> Result<(), ReviewError> {
        let active = snapshot.require_resolved()?;
        if item.scope != *active {
            tracing::warn!(
                item_id = %item.id,
                item_scope = %item.scope,
                active_scope = %active,
                "refusing cross-scope decision"
            );
            return Err(ReviewError::ScopeMismatch {
                item_scope: item.scope.clone(),
                active_scope: active.clone(),
            });
        }
        Ok(())
    }

    /// Pending -> Processing; `false` if another decision got there first
    fn begin(&self, item: &ProposalItem) -> Result<bool, ReviewError> {
        let mut tracked = self
            .states
            .entry(item.id.clone())
            .or_insert_with(|| Tracked::new(item.status));
        if tracked.status != ProposalStatus::Pending {
            return Ok(false);
        }
        tracked.transition(ProposalStatus::Processing)?;
        Ok(true)
    }

    fn transition(&self, item_id: &str, to: ProposalStatus) -> Result<(), ReviewError> {
        let mut tracked = self
            .states
            .get_mut(item_id)
            .ok_or_else(|| ReviewError::UnknownItem(item_id.to_string()))?;
        tracked.transition(to)
    }

    fn notify(&self, item_id: &str, status: ProposalStatus) {
        if let Some(sink) = &self.sink {
            sink.status_changed(item_id, status);
        }
    }

    async fn apply_guarded(
        &self,
        family: &ApplyFamily,
        item: &ProposalItem,
        decision: &Decision,
        target: ProposalStatus,
        snapshot: &ScopeSnapshot,
    ) -> Result<Option<ApplyResponse>, ReviewError> {
        let limit = self.settings.apply_timeout;
        tokio::select! {
            _ = snapshot.token.cancelled() => Err(ReviewError::Cancelled),
            result = tokio::time::timeout(
                limit,
                self.apply(family, item, decision, target, &snapshot.context),
            ) => result.unwrap_or_else(|_| Err(ReviewError::Timeout {
                duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })),
        }
    }

    async fn apply(
        &self,
        family: &ApplyFamily,
        item: &ProposalItem,
        decision: &Decision,
        target: ProposalStatus,
        scope: &ScopeContext,
    ) -> Result<Option<ApplyResponse>, ReviewError> {
        match family {
            ApplyFamily::ScopedApply => {
                let request = ApplyRequest {
                    proposal_type: item.proposal_type.clone(),
                    status: if target == ProposalStatus::Approved {
                        ApplyStatus::Approved
                    } else {
                        ApplyStatus::Rejected
                    },
                    thread_id: self.stream.thread_id(),
                    decision_id: decision_id(item).to_string(),
                    item: ApplyItem {
                        args: decision.effective_args(item),
                        preview_data: item.payload.preview_data.clone(),
                        title: item.title.clone(),
                    },
                };
                let response = self
                    .backend
                    .apply_decision(scope, &request)
                    .await
                    .map_err(|err| ReviewError::apply_failed(&item.id, err.message()))?;
                if response.is_error() {
                    let message = response
                        .message
                        .unwrap_or_else(|| format!("backend reported status '{}'", response.status));
                    return Err(ReviewError::apply_failed(&item.id, message));
                }
                Ok(Some(response))
            }
            ApplyFamily::InterruptResume {
                interrupt_id,
                request_index,
            } => {
                let payload = ResumePayload {
                    interrupt_id: interrupt_id.clone(),
                    request_index: *request_index,
                    decision: decision.resume_decision(),
                };
                self.stream
                    .submit(scope, &payload)
                    .await
                    .map_err(|err| ReviewError::apply_failed(&item.id, err.message()))?;
                Ok(None)
            }
        }
    }

    async fn persist_record(
        &self,
        item: &ProposalItem,
        decision: &Decision,
        status: ProposalStatus,
        scope: &ScopeContext,
    ) -> bool {
        let id = match &item.origin {
            ProposalOrigin::Persisted { record_id } => record_id.clone(),
            ProposalOrigin::Interrupt { .. } => ulid::Ulid::new().to_string(),
        };
        let record =
            DecisionRecord::for_decision(id, item, status, decision.effective_args(item), Utc::now());

        match self.backend.persist_decision(scope, &record).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    item_id = %item.id,
                    record_id = %record.id,
                    error = %err,
                    "decision applied but audit record was not stored"
                );
                false
            }
        }
    }
}

fn decision_id(item: &ProposalItem) -> &str {
    match &item.origin {
        ProposalOrigin::Persisted { record_id } => record_id.as_str(),
        ProposalOrigin::Interrupt { .. } => item.id.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resume_decisions() {
        assert_eq!(Decision::approve().resume_decision().decision_type, DecisionType::Approve);

        let mut args = Args::new();
        args.insert("name".into(), json!("edited"));
        let edited = Decision::approve_with(args.clone()).resume_decision();
        assert_eq!(edited.decision_type, DecisionType::Edit);
        assert_eq!(edited.args, Some(args));

        let rejected = Decision::reject_because("wrong tenant").resume_decision();
        assert_eq!(rejected.decision_type, DecisionType::Reject);
        assert_eq!(rejected.args.unwrap()["reason"], "wrong tenant");
    }

    #[test]
    fn tracked_history() {
        let mut tracked = Tracked::new(ProposalStatus::Pending);
        tracked.transition(ProposalStatus::Processing).unwrap();
        tracked.transition(ProposalStatus::Pending).unwrap();
        assert!(tracked.transition(ProposalStatus::Approved).is_err());
        assert_eq!(
            tracked.history,
            vec![ProposalStatus::Pending, ProposalStatus::Processing, ProposalStatus::Pending]
        );
    }
}
