//! Testing utilities for the HITL workspace
//!
//! In-memory [`FakeBackend`] and [`FakeInterruptStream`] with call counters,
//! injectable failures and delays, plus fixture builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use hitl_core::{
    ActionRequest, ApplyRequest, ApplyResponse, BackendError, DecisionBackend, DecisionRecord,
    Interrupt, InterruptStream, ResumePayload, ScopeContext,
};
use hitl_diff::{
    DiffEntity, DiffEnvelope, DiffSide, Partition, ProgressionDirection, ProgressionStats,
    SubsetStats,
};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Scope with both ids
pub fn scope(org: &str, project: &str) -> ScopeContext {
    ScopeContext::new(Some(org), Some(project))
}

/// Canonical route for a scope
pub fn route(org: &str, project: &str) -> String {
    format!("/org/{org}-name/{org}/project/{project}-name/{project}")
}

/// Interrupt with one action request per `(tool, trigger_id)`
pub fn interrupt(id: &str, requests: &[(&str, &str)]) -> Interrupt {
    Interrupt::new(
        id,
        requests
            .iter()
            .map(|(name, trigger)| ActionRequest::new(*name).with_arg("trigger_id", *trigger))
            .collect(),
    )
}

/// Pending record scoped to `scope`
pub fn record(id: &str, proposal_type: &str, scope: &ScopeContext) -> DecisionRecord {
    DecisionRecord::new(id, proposal_type, "pending").with_scope(scope)
}

/// Entities with the given ids
pub fn entities(ids: &[&str]) -> Vec<DiffEntity> {
    ids.iter().map(|id| DiffEntity::new(*id)).collect()
}

/// Subset envelope keeping `kept` out of `kept + dropped`
pub fn subset_envelope(kept: &[&str], dropped: &[&str]) -> DiffEnvelope {
    let all: Vec<&str> = kept.iter().chain(dropped).copied().collect();
    let total = all.len().max(1) as f64;
    DiffEnvelope::subset(
        DiffSide::new(entities(&all)),
        DiffSide::new(entities(kept)),
        Partition::new()
            .with_removed(entities(dropped))
            .with_unchanged(entities(kept)),
        SubsetStats {
            active_count: kept.len(),
            inactive_count: dropped.len(),
            reduction_percentage: dropped.len() as f64 / total * 100.0,
        },
    )
}

/// Progression envelope at `completion` percent
pub fn progression_envelope(done: &[&str], added: &[&str], completion: f64) -> DiffEnvelope {
    let after: Vec<&str> = done.iter().chain(added).copied().collect();
    DiffEnvelope::progression(
        DiffSide::new(entities(done)),
        DiffSide::new(entities(&after)),
        Partition::new()
            .with_added(entities(added))
            .with_unchanged(entities(done)),
        ProgressionStats {
            completion_percentage: completion,
            items_added: added.len(),
            items_remaining: 0,
            direction: ProgressionDirection::Forward,
        },
    )
}

/// Server-side failure
pub fn http_error(status: u16, message: &str) -> BackendError {
    BackendError::Http {
        status,
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Fake decision backend
// ---------------------------------------------------------------------------

/// In-memory decision backend
#[derive(Debug)]
pub struct FakeBackend {
    records: Mutex<Vec<DecisionRecord>>,
    list_failure: Mutex<Option<BackendError>>,
    list_delay: Mutex<Option<Duration>>,
    apply_failures: Mutex<VecDeque<BackendError>>,
    apply_response: Mutex<ApplyResponse>,
    apply_delay: Mutex<Option<Duration>>,
    persist_failure: Mutex<Option<BackendError>>,
    list_scopes: Mutex<Vec<ScopeContext>>,
    applied: Mutex<Vec<(ScopeContext, ApplyRequest)>>,
    persisted: Mutex<Vec<DecisionRecord>>,
    list_calls: AtomicUsize,
    apply_calls: AtomicUsize,
    persist_calls: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            list_failure: Mutex::new(None),
            list_delay: Mutex::new(None),
            apply_failures: Mutex::new(VecDeque::new()),
            apply_response: Mutex::new(ApplyResponse::success()),
            apply_delay: Mutex::new(None),
            persist_failure: Mutex::new(None),
            list_scopes: Mutex::new(Vec::new()),
            applied: Mutex::new(Vec::new()),
            persisted: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
            persist_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_records(self, records: Vec<DecisionRecord>) -> Self {
        *self.records.lock() = records;
        self
    }

    pub fn with_list_failure(self, err: BackendError) -> Self {
        *self.list_failure.lock() = Some(err);
        self
    }

    pub fn with_list_delay(self, delay: Duration) -> Self {
        *self.list_delay.lock() = Some(delay);
        self
    }

    pub fn with_apply_response(self, response: ApplyResponse) -> Self {
        *self.apply_response.lock() = response;
        self
    }

    pub fn with_apply_delay(self, delay: Duration) -> Self {
        *self.apply_delay.lock() = Some(delay);
        self
    }

    pub fn with_persist_failure(self, err: BackendError) -> Self {
        *self.persist_failure.lock() = Some(err);
        self
    }

    /// Fail the next apply call only
    pub fn fail_next_apply(&self, err: BackendError) {
        self.apply_failures.lock().push_back(err);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    pub fn list_scopes(&self) -> Vec<ScopeContext> {
        self.list_scopes.lock().clone()
    }

    pub fn applied(&self) -> Vec<(ScopeContext, ApplyRequest)> {
        self.applied.lock().clone()
    }

    pub fn persisted(&self) -> Vec<DecisionRecord> {
        self.persisted.lock().clone()
    }
}

#[async_trait]
impl DecisionBackend for FakeBackend {
    async fn list_pending_decisions(
        &self,
        scope: &ScopeContext,
    ) -> Result<Vec<DecisionRecord>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.list_scopes.lock().push(scope.clone());
        let delay = *self.list_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.list_failure.lock().clone() {
            return Err(err);
        }
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.org_id.is_none() || r.org_id == scope.org_id)
            .filter(|r| r.project_id.is_none() || r.project_id == scope.project_id)
            .cloned()
            .collect())
    }

    async fn apply_decision(
        &self,
        scope: &ScopeContext,
        request: &ApplyRequest,
    ) -> Result<ApplyResponse, BackendError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.apply_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.apply_failures.lock().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        self.applied.lock().push((scope.clone(), request.clone()));
        Ok(self.apply_response.lock().clone())
    }

    async fn persist_decision(
        &self,
        _scope: &ScopeContext,
        record: &DecisionRecord,
    ) -> Result<(), BackendError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.persist_failure.lock().clone() {
            return Err(err);
        }
        self.persisted.lock().push(record.clone());
        let mut records = self.records.lock();
        records.retain(|r| r.id != record.id);
        records.push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fake interrupt stream
// ---------------------------------------------------------------------------

/// In-memory interrupt stream
///
/// A submitted request is resolved; an interrupt disappears once all its
/// requests are resolved.
#[derive(Debug)]
pub struct FakeInterruptStream {
    interrupts: Mutex<Vec<Interrupt>>,
    resolved: Mutex<HashSet<(String, usize)>>,
    submitted: Mutex<Vec<ResumePayload>>,
    submit_failures: Mutex<VecDeque<BackendError>>,
    submit_delay: Mutex<Option<Duration>>,
    failure: Mutex<Option<BackendError>>,
    thread_id: Option<String>,
    submit_calls: AtomicUsize,
}

impl Default for FakeInterruptStream {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeInterruptStream {
    pub fn new() -> Self {
        Self {
            interrupts: Mutex::new(Vec::new()),
            resolved: Mutex::new(HashSet::new()),
            submitted: Mutex::new(Vec::new()),
            submit_failures: Mutex::new(VecDeque::new()),
            submit_delay: Mutex::new(None),
            failure: Mutex::new(None),
            thread_id: Some("thread-1".to_string()),
            submit_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_interrupts(self, interrupts: Vec<Interrupt>) -> Self {
        *self.interrupts.lock() = interrupts;
        self
    }

    pub fn with_failure(self, err: BackendError) -> Self {
        *self.failure.lock() = Some(err);
        self
    }

    pub fn with_submit_delay(self, delay: Duration) -> Self {
        *self.submit_delay.lock() = Some(delay);
        self
    }

    pub fn push(&self, interrupt: Interrupt) {
        self.interrupts.lock().push(interrupt);
    }

    /// Fail the next submit call only
    pub fn fail_next_submit(&self, err: BackendError) {
        self.submit_failures.lock().push_back(err);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<ResumePayload> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl InterruptStream for FakeInterruptStream {
    async fn current_interrupts(&self) -> Result<Vec<Interrupt>, BackendError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        let resolved = self.resolved.lock();
        Ok(self
            .interrupts
            .lock()
            .iter()
            .filter(|i| {
                (0..i.value.action_requests.len())
                    .any(|idx| !resolved.contains(&(i.id.clone(), idx)))
            })
            .cloned()
            .collect())
    }

    async fn submit(&self, _scope: &ScopeContext, payload: &ResumePayload) -> Result<(), BackendError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.submit_failures.lock().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        self.resolved
            .lock()
            .insert((payload.interrupt_id.clone(), payload.request_index));
        self.submitted.lock().push(payload.clone());
        Ok(())
    }

    fn thread_id(&self) -> Option<String> {
        self.thread_id.clone()
    }
}
