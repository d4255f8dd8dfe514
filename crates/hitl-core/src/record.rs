//! Persisted decision records

use crate::proposal::{Args, ProposalItem, ProposalOrigin, ProposalStatus};
use crate::scope::ScopeContext;
use chrono::{DateTime, Utc};
use hitl_diff::DiffEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend-owned record of a decision
///
/// Accepts both snake_case and camelCase field names on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Record id
    pub id: String,
    /// Proposal type
    #[serde(rename = "type")]
    pub proposal_type: String,
    /// Record status (`pending`, `proposed`, `approved`, ...)
    pub status: String,
    /// Arguments the proposal was generated from
    #[serde(
        default,
        alias = "generationInputs",
        deserialize_with = "hitl_diff::null_as_default"
    )]
    pub generation_inputs: Args,
    /// Creation time
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Id of the record that replaced this one
    #[serde(default, alias = "supersededBy", skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
    /// Title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Preview data
    #[serde(default, alias = "previewData", skip_serializing_if = "Option::is_none")]
    pub preview_data: Option<Value>,
    /// Diff envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffEnvelope>,
    /// Organization id
    #[serde(default, alias = "orgId", skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Project id
    #[serde(default, alias = "projectId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl DecisionRecord {
    /// Create record
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        proposal_type: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            proposal_type: proposal_type.into(),
            status: status.into(),
            generation_inputs: Args::new(),
            created_at: None,
            updated_at: None,
            superseded_by: None,
            title: None,
            summary: None,
            preview_data: None,
            diff: None,
            org_id: None,
            project_id: None,
        }
    }

    /// Audit record for a terminal decision on `item`
    #[must_use]
    pub fn for_decision(
        id: impl Into<String>,
        item: &ProposalItem,
        status: ProposalStatus,
        args: Args,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            generation_inputs: args,
            created_at: Some(at),
            updated_at: Some(at),
            title: Some(item.title.clone()),
            summary: (!item.summary.is_empty()).then(|| item.summary.clone()),
            preview_data: item.payload.preview_data.clone(),
            diff: item.payload.diff.clone(),
            org_id: item.scope.org_id.clone(),
            project_id: item.scope.project_id.clone(),
            ..Self::new(id, item.proposal_type.clone(), status.as_str())
        }
    }

    /// With superseding record id
    #[inline]
    #[must_use]
    pub fn with_superseded_by(mut self, id: impl Into<String>) -> Self {
        self.superseded_by = Some(id.into());
        self
    }

    /// With creation time
    #[inline]
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// With generation inputs
    #[inline]
    #[must_use]
    pub fn with_inputs(mut self, inputs: Args) -> Self {
        self.generation_inputs = inputs;
        self
    }

    /// With scope
    #[inline]
    #[must_use]
    pub fn with_scope(mut self, scope: &ScopeContext) -> Self {
        self.org_id = scope.org_id.clone();
        self.project_id = scope.project_id.clone();
        self
    }

    /// Check if a later record replaced this one
    #[inline]
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }

    /// Rebuild a reviewable item
    ///
    /// Record scope fields win; the query scope fills the gaps. The query's
    /// project is only borrowed when the org it belongs to is the item's org.
    #[must_use]
    pub fn to_item(&self, query_scope: &ScopeContext) -> ProposalItem {
        let org_id = self.org_id.clone().or_else(|| query_scope.org_id.clone());
        let project_id = self.project_id.clone().or_else(|| {
            (org_id == query_scope.org_id)
                .then(|| query_scope.project_id.clone())
                .flatten()
        });
        let scope = ScopeContext { org_id, project_id };
        let mut item = ProposalItem::new(
            self.id.clone(),
            self.proposal_type.clone(),
            scope,
            ProposalOrigin::Persisted {
                record_id: self.id.clone(),
            },
        )
        .with_args(self.generation_inputs.clone());

        if let Some(title) = &self.title {
            item.title.clone_from(title);
        }
        if let Some(summary) = &self.summary {
            item.summary.clone_from(summary);
        }
        item.payload.preview_data.clone_from(&self.preview_data);
        item.payload.diff.clone_from(&self.diff);
        item
    }
}
