//! Binary document and structured-data renderers

use crate::renderer::{PreviewContent, RenderContext, RenderError, Renderer, BINARY, JSON};
use crate::view::{Section, View};

/// Describes binary documents (PDF and others) by their metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryRenderer;

impl Renderer for BinaryRenderer {
    fn name(&self) -> &str {
        BINARY
    }

    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError> {
        let PreviewContent::Binary {
            mime_type,
            file_name,
            size_bytes,
            uri,
        } = content
        else {
            return Err(RenderError::unsupported(self, content));
        };

        let mut details = Section::titled("Document").line(format!("type: {mime_type}"));
        if let Some(name) = file_name {
            details = details.line(format!("file: {name}"));
        }
        if let Some(size) = size_bytes {
            details = details.line(format!("size: {}", human_size(*size)));
        }
        if let Some(uri) = uri {
            details = details.line(format!("location: {uri}"));
        }

        Ok(View::new(content.content_type())
            .with_title_opt(ctx.title.as_deref())
            .section(details))
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Pretty-prints arbitrary preview data
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn name(&self) -> &str {
        JSON
    }

    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError> {
        let PreviewContent::Json(value) = content else {
            return Err(RenderError::unsupported(self, content));
        };

        let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Ok(View::new(JSON)
            .with_title_opt(ctx.title.as_deref())
            .section(Section::untitled().lines(pretty.lines())))
    }
}
