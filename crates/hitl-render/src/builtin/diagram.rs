//! Architecture diagram renderer

use crate::renderer::{PreviewContent, RenderContext, RenderError, Renderer, DIAGRAM};
use crate::view::{Section, View};

/// Lists diagram nodes and edges
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagramRenderer;

impl Renderer for DiagramRenderer {
    fn name(&self) -> &str {
        DIAGRAM
    }

    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError> {
        let PreviewContent::Diagram(diagram) = content else {
            return Err(RenderError::unsupported(self, content));
        };

        let nodes = Section::titled(format!("Components ({})", diagram.nodes.len())).lines(
            diagram.nodes.iter().map(|n| {
                let label = n.label.as_deref().unwrap_or(&n.id);
                match &n.kind {
                    Some(kind) => format!("{label} [{kind}]"),
                    None => label.to_string(),
                }
            }),
        );

        let edges = Section::titled(format!("Connections ({})", diagram.edges.len())).lines(
            diagram.edges.iter().map(|e| match &e.label {
                Some(label) => format!("{} -> {} ({label})", e.from, e.to),
                None => format!("{} -> {}", e.from, e.to),
            }),
        );

        Ok(View::new(DIAGRAM)
            .with_title_opt(ctx.title.as_deref())
            .section(nodes)
            .section(edges))
    }
}
