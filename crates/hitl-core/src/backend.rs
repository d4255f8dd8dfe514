//! Backend seams
//!
//! The engine talks to two external collaborators: the decision backend
//! (persisted records and the scoped apply endpoint) and the live interrupt
//! stream of a paused run. Both are traits so the HTTP client and in-memory
//! fakes plug in the same way.

use crate::error::BackendError;
use crate::interrupt::{Interrupt, ResumePayload};
use crate::proposal::Args;
use crate::record::DecisionRecord;
use crate::scope::ScopeContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

/// Terminal decision sent to the apply endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    /// Approved
    Approved,
    /// Rejected
    Rejected,
}

/// Item body of an apply request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyItem {
    /// Arguments, edited if the reviewer edited them
    pub args: Args,
    /// Preview data
    #[serde(default)]
    pub preview_data: Option<Value>,
    /// Title
    pub title: String,
}

/// Body of `POST /decisions/apply`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyRequest {
    /// Proposal type
    pub proposal_type: String,
    /// Decision
    pub status: ApplyStatus,
    /// Run thread, if any
    pub thread_id: Option<String>,
    /// Decision id (item or record id)
    pub decision_id: String,
    /// Item body
    pub item: ApplyItem,
}

/// Response of `POST /decisions/apply`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplyResponse {
    /// `success` or `error`
    pub status: String,
    /// Backend message
    #[serde(default)]
    pub message: Option<String>,
    /// Knowledge graph version after the apply
    #[serde(default)]
    pub kg_version_sha: Option<String>,
    /// Agent now active
    #[serde(default)]
    pub active_agent: Option<String>,
    /// Trigger now current
    #[serde(default)]
    pub current_trigger_id: Option<String>,
    /// Messages to append to the conversation
    #[serde(default, deserialize_with = "hitl_diff::null_as_default")]
    pub messages: Vec<Value>,
}

impl ApplyResponse {
    /// Successful response with no deltas
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            ..Self::default()
        }
    }

    /// Error response
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Check if the backend reported failure in the body
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.status.as_str(), "error" | "failed" | "failure")
    }
}

/// Decision backend
#[async_trait]
pub trait DecisionBackend: Send + Sync + Debug {
    /// List decision records visible under `scope`
    async fn list_pending_decisions(
        &self,
        scope: &ScopeContext,
    ) -> Result<Vec<DecisionRecord>, BackendError>;

    /// Apply a decision through the scoped apply endpoint
    async fn apply_decision(
        &self,
        scope: &ScopeContext,
        request: &ApplyRequest,
    ) -> Result<ApplyResponse, BackendError>;

    /// Persist an audit record
    async fn persist_decision(
        &self,
        scope: &ScopeContext,
        record: &DecisionRecord,
    ) -> Result<(), BackendError>;
}

/// Live run/interrupt stream
#[async_trait]
pub trait InterruptStream: Send + Sync + Debug {
    /// Outstanding interrupts of the run
    async fn current_interrupts(&self) -> Result<Vec<Interrupt>, BackendError>;

    /// Resume one action request of an interrupt
    async fn submit(&self, scope: &ScopeContext, payload: &ResumePayload)
        -> Result<(), BackendError>;

    /// Run thread the stream follows
    fn thread_id(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_request_wire() {
        let request = ApplyRequest {
            proposal_type: "generate_concept_brief".into(),
            status: ApplyStatus::Approved,
            thread_id: Some("t1".into()),
            decision_id: "d1".into(),
            item: ApplyItem {
                args: Args::new(),
                preview_data: None,
                title: "Concept brief".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({
                "proposal_type": "generate_concept_brief",
                "status": "approved",
                "thread_id": "t1",
                "decision_id": "d1",
                "item": {"args": {}, "preview_data": null, "title": "Concept brief"}
            })
        );
    }

    #[test]
    fn apply_response_partial() {
        let response: ApplyResponse = serde_json::from_value(json!({
            "status": "success",
            "active_agent": "architect"
        }))
        .unwrap();
        assert!(!response.is_error());
        assert_eq!(response.active_agent.as_deref(), Some("architect"));
        assert!(response.messages.is_empty());
        assert!(ApplyResponse::error("nope").is_error());
    }

    #[test]
    fn null_messages_are_no_messages() {
        let response: ApplyResponse = serde_json::from_value(json!({
            "status": "success",
            "kg_version_sha": "abc123",
            "messages": null
        }))
        .unwrap();
        assert!(!response.is_error());
        assert!(response.messages.is_empty());
        assert_eq!(response.kg_version_sha.as_deref(), Some("abc123"));
    }
}
