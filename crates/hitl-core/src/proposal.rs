//! Proposal model
//!
//! A [`ProposalItem`] is one backend-suggested change awaiting a human
//! decision, normalized from either the live interrupt stream or the
//! persisted record store.

use crate::scope::ScopeContext;
use hitl_diff::DiffEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Tool arguments of a proposal
pub type Args = Map<String, Value>;

/// Review status of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Awaiting a decision
    #[default]
    Pending,
    /// Decision is being applied
    Processing,
    /// Approved and applied
    Approved,
    /// Rejected
    Rejected,
}

impl ProposalStatus {
    /// Every status, in lifecycle order
    pub const ALL: [Self; 4] = [Self::Pending, Self::Processing, Self::Approved, Self::Rejected];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a proposal came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalOrigin {
    /// Action request of a live interrupt
    Interrupt {
        /// Interrupt id
        interrupt_id: String,
        /// Position within the interrupt's action requests
        request_index: usize,
    },
    /// Persisted decision record
    Persisted {
        /// Record id
        record_id: String,
    },
}

impl ProposalOrigin {
    /// Check if this came from the live stream
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Interrupt { .. })
    }
}

/// Proposal content
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPayload {
    /// Tool arguments
    #[serde(default, deserialize_with = "hitl_diff::null_as_default")]
    pub args: Args,
    /// Free-form preview data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_data: Option<Value>,
    /// Diff envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffEnvelope>,
}

/// Merge identity: proposals with equal keys describe the same logical decision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    /// Proposal type
    pub proposal_type: String,
    /// Value of the first identifying argument present
    pub identifier: Option<String>,
}

/// One reviewable proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalItem {
    /// Unique within one aggregated list
    pub id: String,
    /// Open taxonomy tag
    #[serde(rename = "type")]
    pub proposal_type: String,
    /// Title
    pub title: String,
    /// Summary
    #[serde(default)]
    pub summary: String,
    /// Review status
    #[serde(default)]
    pub status: ProposalStatus,
    /// Tenant the proposal was produced under
    pub scope: ScopeContext,
    /// Content
    #[serde(default)]
    pub payload: ProposalPayload,
    /// Source reference
    pub origin: ProposalOrigin,
}

impl ProposalItem {
    /// Create pending item titled from the type label
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        proposal_type: impl Into<String>,
        scope: ScopeContext,
        origin: ProposalOrigin,
    ) -> Self {
        let proposal_type = proposal_type.into();
        Self {
            id: id.into(),
            title: proposal_label(&proposal_type),
            proposal_type,
            summary: String::new(),
            status: ProposalStatus::Pending,
            scope,
            payload: ProposalPayload::default(),
            origin,
        }
    }

    /// With title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// With summary
    #[inline]
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// With arguments
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: Args) -> Self {
        self.payload.args = args;
        self
    }

    /// With one argument
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.args.insert(key.into(), value.into());
        self
    }

    /// With preview data
    #[inline]
    #[must_use]
    pub fn with_preview_data(mut self, preview: Value) -> Self {
        self.payload.preview_data = Some(preview);
        self
    }

    /// With diff envelope
    #[inline]
    #[must_use]
    pub fn with_diff(mut self, diff: DiffEnvelope) -> Self {
        self.payload.diff = Some(diff);
        self
    }

    /// Check if this came from the live stream
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.origin.is_live()
    }

    /// Merge identity using the given argument names, first present wins
    #[must_use]
    pub fn identity_key(&self, identity_args: &[String]) -> IdentityKey {
        let identifier = identity_args
            .iter()
            .find_map(|name| self.payload.args.get(name).filter(|value| !value.is_null()))
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        IdentityKey {
            proposal_type: self.proposal_type.clone(),
            identifier,
        }
    }
}

/// Human label for a proposal type
///
/// Unknown types are title-cased from their tag.
#[must_use]
pub fn proposal_label(proposal_type: &str) -> String {
    let known = match proposal_type {
        "classify_intent" => Some("Intent classification"),
        "generate_concept_brief" => Some("Concept brief"),
        "generate_hydration" | "hydration_complete" => Some("Knowledge graph hydration"),
        "update_knowledge_graph" => Some("Knowledge graph update"),
        "select_standards" => Some("Standards selection"),
        "propose_organization" => Some("Organization change"),
        _ => None,
    };
    known.map_or_else(|| title_case(proposal_type), str::to_string)
}

fn title_case(tag: &str) -> String {
    let words: Vec<&str> = tag.split(['_', '-', ' ']).filter(|w| !w.is_empty()).collect();
    if words.is_empty() {
        return "Proposal".to_string();
    }
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) if i == 0 => first.to_uppercase().chain(chars).collect(),
                _ => (*word).to_string(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
