//! Renderer output
//!
//! A [`View`] is a presentation-neutral description of a preview: titled
//! sections of text lines. Front ends decide how to draw it.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Titled block of lines
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Section {
    /// Optional heading
    pub heading: Option<String>,
    /// Body lines
    pub lines: Vec<String>,
}

impl Section {
    /// Create section with heading
    #[inline]
    #[must_use]
    pub fn titled(heading: impl Into<String>) -> Self {
        Self {
            heading: Some(heading.into()),
            lines: Vec::new(),
        }
    }

    /// Create section without heading
    #[inline]
    #[must_use]
    pub fn untitled() -> Self {
        Self::default()
    }

    /// Append a line
    #[inline]
    #[must_use]
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Append many lines
    #[inline]
    #[must_use]
    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
        self
    }

    /// True when there is neither heading nor body
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heading.is_none() && self.lines.is_empty()
    }
}

/// Rendered preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// Registry key of the renderer that produced this view
    pub renderer: String,
    /// Top-level title
    pub title: Option<String>,
    /// Body
    pub sections: Vec<Section>,
    /// Set when no renderer could handle the content
    pub fallback: bool,
}

impl View {
    /// Create empty view for a renderer key
    #[inline]
    #[must_use]
    pub fn new(renderer: impl Into<String>) -> Self {
        Self {
            renderer: renderer.into(),
            title: None,
            sections: Vec::new(),
            fallback: false,
        }
    }

    /// The "no preview available" view
    #[must_use]
    pub fn fallback(content_type: &str) -> Self {
        Self {
            renderer: content_type.to_string(),
            title: None,
            sections: vec![Section::untitled()
                .line(format!("No preview available for content type '{content_type}'."))],
            fallback: true,
        }
    }

    /// With title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// With title if present
    #[inline]
    #[must_use]
    pub fn with_title_opt(mut self, title: Option<&str>) -> Self {
        if let Some(title) = title {
            self.title = Some(title.to_string());
        }
        self
    }

    /// Append a section, skipping empty ones
    #[inline]
    #[must_use]
    pub fn section(mut self, section: Section) -> Self {
        if !section.is_empty() {
            self.sections.push(section);
        }
        self
    }

    /// Append a section in place, skipping empty ones
    #[inline]
    pub fn push(&mut self, section: Section) {
        if !section.is_empty() {
            self.sections.push(section);
        }
    }

    /// Plain-text rendering for terminals and logs
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            let _ = writeln!(out, "{title}");
            let _ = writeln!(out, "{}", "=".repeat(title.chars().count()));
        }
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 || self.title.is_some() {
                out.push('\n');
            }
            if let Some(heading) = &section.heading {
                let _ = writeln!(out, "{heading}");
            }
            for line in &section.lines {
                let _ = writeln!(out, "  {line}");
            }
        }
        out
    }
}
