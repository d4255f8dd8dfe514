//! Proposal previews
//!
//! Maps a proposal's payload onto [`PreviewContent`] and renders it through a
//! [`RendererRegistry`]. A diff envelope takes priority over preview data;
//! with neither, the arguments are shown as JSON.

use crate::error::ReviewError;
use crate::proposal::ProposalItem;
use hitl_render::{ArchitectureDiagram, PreviewContent, RenderContext, RenderError, RendererRegistry, View};
use serde_json::{Map, Value};

fn string_field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| object.get(*k).and_then(Value::as_str))
}

/// Classify free-form preview data
#[must_use]
pub fn classify_preview_data(data: &Value) -> PreviewContent {
    let Value::Object(object) = data else {
        return match data {
            Value::String(text) => PreviewContent::Markdown(text.clone()),
            other => PreviewContent::Json(other.clone()),
        };
    };

    if let Some(markdown) = string_field(object, &["markdown"]) {
        return PreviewContent::Markdown(markdown.to_string());
    }
    if string_field(object, &["content_type", "contentType"]) == Some("markdown") {
        if let Some(content) = string_field(object, &["content"]) {
            return PreviewContent::Markdown(content.to_string());
        }
    }
    if let Some(mime_type) = string_field(object, &["mime_type", "mimeType"]) {
        return PreviewContent::Binary {
            mime_type: mime_type.to_string(),
            file_name: string_field(object, &["file_name", "fileName"]).map(str::to_string),
            size_bytes: object
                .get("size_bytes")
                .or_else(|| object.get("sizeBytes"))
                .and_then(Value::as_u64),
            uri: string_field(object, &["uri", "url"]).map(str::to_string),
        };
    }
    if object.get("nodes").is_some_and(Value::is_array) {
        match serde_json::from_value::<ArchitectureDiagram>(data.clone()) {
            Ok(diagram) => return PreviewContent::Diagram(diagram),
            Err(err) => tracing::debug!(error = %err, "preview data is not a diagram"),
        }
    }
    PreviewContent::Json(data.clone())
}

impl ProposalItem {
    /// Content to preview this proposal with
    #[must_use]
    pub fn preview_content(&self) -> PreviewContent {
        if let Some(diff) = &self.payload.diff {
            return PreviewContent::Diff(diff.clone());
        }
        match &self.payload.preview_data {
            Some(data) => classify_preview_data(data),
            None => PreviewContent::Json(Value::Object(self.payload.args.clone())),
        }
    }

    /// Render context carrying this proposal's type and title
    #[must_use]
    pub fn render_context(&self) -> RenderContext {
        RenderContext::new()
            .with_proposal_type(self.proposal_type.clone())
            .with_title(self.title.clone())
    }

    /// Check the diff envelope, if any
    ///
    /// # Errors
    /// Returns [`ReviewError::DiffShapeInvalid`] with the first violation.
    pub fn check_diff(&self) -> Result<(), ReviewError> {
        match &self.payload.diff {
            Some(diff) => diff.validate().map_err(ReviewError::from),
            None => Ok(()),
        }
    }
}

/// Render a proposal, failing when no renderer can draw it
///
/// # Errors
/// Returns [`ReviewError::RendererMissing`] when the content type has no
/// usable renderer.
pub fn try_render_item(registry: &RendererRegistry, item: &ProposalItem) -> Result<View, ReviewError> {
    registry
        .try_render(&item.preview_content(), &item.render_context())
        .map_err(|err| match err {
            RenderError::Missing(content_type) => ReviewError::RendererMissing(content_type),
            RenderError::Unsupported { content_type, .. } => {
                ReviewError::RendererMissing(content_type)
            }
        })
}

/// Render a proposal, degrading to the "no preview available" view
#[must_use]
pub fn render_item(registry: &RendererRegistry, item: &ProposalItem) -> View {
    if let Err(err) = item.check_diff() {
        tracing::warn!(
            item_id = %item.id,
            proposal_type = %item.proposal_type,
            error = %err,
            "rendering proposal with an invalid diff"
        );
    }
    registry.render(&item.preview_content(), &item.render_context())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::ProposalOrigin;
    use crate::scope::ScopeContext;
    use hitl_diff::{DiffEnvelope, DiffSide, Partition, SubsetStats};
    use hitl_render::{BINARY, DIAGRAM, JSON, MARKDOWN, PDF};
    use serde_json::json;

    fn item() -> ProposalItem {
        ProposalItem::new(
            "r1",
            "generate_concept_brief",
            ScopeContext::new(Some("o1"), None),
            ProposalOrigin::Persisted {
                record_id: "r1".into(),
            },
        )
    }

    #[test]
    fn classifies_preview_data() {
        assert_eq!(classify_preview_data(&json!({"markdown": "# Hi"})).content_type(), MARKDOWN);
        assert_eq!(
            classify_preview_data(&json!({"content_type": "markdown", "content": "x"})).content_type(),
            MARKDOWN
        );
        assert_eq!(
            classify_preview_data(&json!({"mime_type": "application/pdf", "size_bytes": 10}))
                .content_type(),
            PDF
        );
        assert_eq!(
            classify_preview_data(&json!({"mimeType": "image/png"})).content_type(),
            BINARY
        );
        assert_eq!(
            classify_preview_data(&json!({"nodes": [{"id": "api"}], "edges": []})).content_type(),
            DIAGRAM
        );
        assert_eq!(classify_preview_data(&json!({"score": 3})).content_type(), JSON);
        assert_eq!(classify_preview_data(&json!("plain text")).content_type(), MARKDOWN);
    }

    #[test]
    fn diff_takes_priority() {
        let diff = DiffEnvelope::subset(
            DiffSide::default(),
            DiffSide::default(),
            Partition::new(),
            SubsetStats::default(),
        );
        let item = item().with_preview_data(json!({"markdown": "x"})).with_diff(diff);
        assert_eq!(item.preview_content().content_type(), "subset");
        assert!(item.check_diff().is_ok());
    }

    #[test]
    fn args_are_the_last_resort() {
        let item = item().with_arg("trigger_id", "t1");
        assert_eq!(item.preview_content(), PreviewContent::Json(json!({"trigger_id": "t1"})));
    }

    #[test]
    fn missing_renderer() {
        let registry = RendererRegistry::new();
        let item = item().with_preview_data(json!({"markdown": "# Brief"}));

        assert!(matches!(
            try_render_item(&registry, &item),
            Err(ReviewError::RendererMissing(t)) if t == MARKDOWN
        ));
        let view = render_item(&registry, &item);
        assert!(view.fallback);
        assert_eq!(view.title.as_deref(), Some("Concept brief"));
    }

    #[test]
    fn renders_with_defaults() {
        let registry = RendererRegistry::with_defaults();
        let item = item().with_preview_data(json!({"markdown": "# Goals\n\nShip."}));
        let view = try_render_item(&registry, &item).unwrap();
        assert_eq!(view.renderer, MARKDOWN);
        assert!(view.to_text().contains("Ship."));
    }
}
