//! Renderer trait and the content it consumes

use crate::view::View;
use hitl_diff::DiffEnvelope;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Registry key for markdown text
pub const MARKDOWN: &str = "markdown";
/// Registry key for PDF documents
pub const PDF: &str = "pdf";
/// Registry key for other binary documents
pub const BINARY: &str = "binary";
/// Registry key for architecture diagrams
pub const DIAGRAM: &str = "diagram";
/// Registry key for arbitrary structured data
pub const JSON: &str = "json";

/// Node of an architecture diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramNode {
    /// Node identifier
    pub id: String,
    /// Display label
    #[serde(default)]
    pub label: Option<String>,
    /// Node category (system, service, store, ...)
    #[serde(default)]
    pub kind: Option<String>,
}

/// Directed edge of an architecture diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramEdge {
    /// Source node id
    pub from: String,
    /// Target node id
    pub to: String,
    /// Relation label
    #[serde(default)]
    pub label: Option<String>,
}

/// Architecture diagram preview
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArchitectureDiagram {
    /// Nodes
    #[serde(default, deserialize_with = "hitl_diff::null_as_default")]
    pub nodes: Vec<DiagramNode>,
    /// Edges
    #[serde(default, deserialize_with = "hitl_diff::null_as_default")]
    pub edges: Vec<DiagramEdge>,
}

/// Content a proposal can be previewed as
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewContent {
    /// Markdown source
    Markdown(String),
    /// Binary document, described rather than embedded
    Binary {
        /// MIME type
        mime_type: String,
        /// File name if known
        file_name: Option<String>,
        /// Size in bytes if known
        size_bytes: Option<u64>,
        /// Download location if known
        uri: Option<String>,
    },
    /// Architecture diagram
    Diagram(ArchitectureDiagram),
    /// Diff envelope (dispatched on `diff.type`)
    Diff(DiffEnvelope),
    /// Anything else
    Json(serde_json::Value),
}

impl PreviewContent {
    /// Registry key this content dispatches on
    #[must_use]
    pub fn content_type(&self) -> &str {
        match self {
            Self::Markdown(_) => MARKDOWN,
            Self::Binary { mime_type, .. } if mime_type == "application/pdf" => PDF,
            Self::Binary { .. } => BINARY,
            Self::Diagram(_) => DIAGRAM,
            Self::Diff(diff) => diff.type_name(),
            Self::Json(_) => JSON,
        }
    }
}

/// Auxiliary dispatch metadata handed to renderers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    /// Proposal type, for renderers that vary by proposal
    pub proposal_type: Option<String>,
    /// Proposal title
    pub title: Option<String>,
}

impl RenderContext {
    /// Create empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With proposal type hint
    #[inline]
    #[must_use]
    pub fn with_proposal_type(mut self, proposal_type: impl Into<String>) -> Self {
        self.proposal_type = Some(proposal_type.into());
        self
    }

    /// With title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Rendering failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// Nothing registered for the content type
    #[error("no renderer registered for content type '{0}'")]
    Missing(String),

    /// Renderer was handed content it does not draw
    #[error("renderer '{renderer}' cannot draw '{content_type}' content")]
    Unsupported {
        /// Renderer name
        renderer: String,
        /// Content type received
        content_type: String,
    },
}

impl RenderError {
    /// Create unsupported-content error
    pub fn unsupported(renderer: &dyn Renderer, content: &PreviewContent) -> Self {
        Self::Unsupported {
            renderer: renderer.name().to_string(),
            content_type: content.content_type().to_string(),
        }
    }
}

/// Rendering capability
///
/// Implement this to add a new preview kind, then register it under one or
/// more content-type keys.
pub trait Renderer: Send + Sync + Debug {
    /// Stable renderer name
    fn name(&self) -> &str;

    /// Draw content
    ///
    /// # Errors
    /// Returns [`RenderError::Unsupported`] for content this renderer does not draw.
    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError>;
}
