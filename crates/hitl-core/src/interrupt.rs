//! Live interrupt stream model
//!
//! A paused backend run exposes either one interrupt or a list of them; each
//! interrupt carries one or more action requests, and each action request
//! becomes one proposal.

use crate::proposal::{proposal_label, Args, ProposalItem, ProposalOrigin};
use crate::scope::ScopeContext;
use hitl_diff::DiffEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool call awaiting approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Tool name; becomes the proposal type
    pub name: String,
    /// Tool arguments
    #[serde(default, deserialize_with = "hitl_diff::null_as_default")]
    pub args: Args,
    /// Human description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Preview data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_data: Option<Value>,
    /// Diff envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffEnvelope>,
}

impl ActionRequest {
    /// Create request
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
            description: None,
            preview_data: None,
            diff: None,
        }
    }

    /// With one argument
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// With diff envelope
    #[inline]
    #[must_use]
    pub fn with_diff(mut self, diff: DiffEnvelope) -> Self {
        self.diff = Some(diff);
        self
    }
}

/// Interrupt payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InterruptValue {
    /// Requests awaiting review
    #[serde(default, deserialize_with = "hitl_diff::null_as_default")]
    pub action_requests: Vec<ActionRequest>,
}

/// One outstanding interrupt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    /// Interrupt id
    pub id: String,
    /// Payload
    #[serde(default, deserialize_with = "hitl_diff::null_as_default")]
    pub value: InterruptValue,
}

impl Interrupt {
    /// Create interrupt
    #[must_use]
    pub fn new(id: impl Into<String>, requests: Vec<ActionRequest>) -> Self {
        Self {
            id: id.into(),
            value: InterruptValue {
                action_requests: requests,
            },
        }
    }

    /// Item id for the request at `index`
    #[must_use]
    pub fn item_id(&self, index: usize) -> String {
        format!("{}-{index}", self.id)
    }

    /// One item per action request, stamped with `scope`
    #[must_use]
    pub fn to_items(&self, scope: &ScopeContext) -> Vec<ProposalItem> {
        self.value
            .action_requests
            .iter()
            .enumerate()
            .map(|(index, request)| {
                let mut item = ProposalItem::new(
                    self.item_id(index),
                    request.name.clone(),
                    scope.clone(),
                    ProposalOrigin::Interrupt {
                        interrupt_id: self.id.clone(),
                        request_index: index,
                    },
                )
                .with_args(request.args.clone())
                .with_title(proposal_label(&request.name));
                if let Some(description) = &request.description {
                    item.summary.clone_from(description);
                }
                item.payload.preview_data.clone_from(&request.preview_data);
                item.payload.diff.clone_from(&request.diff);
                item
            })
            .collect()
    }
}

/// Interrupt value as exposed by the run: one or many
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterruptSet {
    /// Several interrupts
    Many(Vec<Interrupt>),
    /// A single interrupt
    One(Interrupt),
}

impl InterruptSet {
    /// Flatten into a list
    #[must_use]
    pub fn into_vec(self) -> Vec<Interrupt> {
        match self {
            Self::Many(all) => all,
            Self::One(one) => vec![one],
        }
    }
}

/// Decision kind sent when resuming an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Approve as proposed
    Approve,
    /// Reject
    Reject,
    /// Approve with edited arguments
    Edit,
}

/// Decision body of a resume payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeDecision {
    /// Decision kind
    #[serde(rename = "type")]
    pub decision_type: DecisionType,
    /// Edited arguments or rejection detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
}

/// Payload resuming one action request of an interrupt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Interrupt being resumed
    pub interrupt_id: String,
    /// Action request the decision is for
    pub request_index: usize,
    /// Decision
    pub decision: ResumeDecision,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_or_list() {
        let one: InterruptSet = serde_json::from_value(json!({
            "id": "i1",
            "value": {"action_requests": [{"name": "classify_intent"}]}
        }))
        .unwrap();
        let many: InterruptSet = serde_json::from_value(json!([
            {"id": "i1", "value": {"action_requests": []}},
            {"id": "i2"}
        ]))
        .unwrap();

        assert_eq!(one.into_vec().len(), 1);
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn null_collections_read_as_empty() {
        let set: InterruptSet = serde_json::from_value(json!([
            {"id": "i1", "value": null},
            {"id": "i2", "value": {"action_requests": null}},
            {"id": "i3", "value": {"action_requests": [{"name": "classify_intent", "args": null}]}}
        ]))
        .unwrap();
        let interrupts = set.into_vec();

        assert!(interrupts[0].value.action_requests.is_empty());
        assert!(interrupts[1].value.action_requests.is_empty());
        assert!(interrupts[2].value.action_requests[0].args.is_empty());
    }

    #[test]
    fn items_are_keyed_by_interrupt_and_index() {
        let interrupt = Interrupt::new(
            "i1",
            vec![
                ActionRequest::new("classify_intent").with_arg("trigger_id", "t1"),
                ActionRequest::new("generate_concept_brief"),
            ],
        );
        let items = interrupt.to_items(&ScopeContext::new(Some("o1"), None));

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "i1-0");
        assert_eq!(items[1].id, "i1-1");
        assert_eq!(
            items[1].origin,
            ProposalOrigin::Interrupt {
                interrupt_id: "i1".into(),
                request_index: 1
            }
        );
        assert_eq!(items[0].payload.args["trigger_id"], "t1");
    }

    #[test]
    fn resume_payload_wire() {
        let payload = ResumePayload {
            interrupt_id: "i1".into(),
            request_index: 0,
            decision: ResumeDecision {
                decision_type: DecisionType::Approve,
                args: None,
            },
        };
        assert_eq!(
            serde_json::to_value(payload).unwrap(),
            json!({"interrupt_id": "i1", "request_index": 0, "decision": {"type": "approve"}})
        );
    }
}
