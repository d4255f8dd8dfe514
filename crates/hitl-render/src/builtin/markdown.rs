//! Markdown preview renderer
//!
//! Uses pulldown-cmark to flatten markdown into headed text sections.

use crate::renderer::{PreviewContent, RenderContext, RenderError, Renderer, MARKDOWN};
use crate::view::{Section, View};
use pulldown_cmark::{Event, Parser as MdParser, Tag, TagEnd};

/// Markdown renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    /// Flatten markdown into sections split at headings
    #[must_use]
    pub fn sections(source: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current = Section::untitled();
        let mut line = String::new();
        let mut heading: Option<String> = None;
        let mut in_code_block = false;
        let mut list_depth = 0usize;

        for event in MdParser::new(source) {
            match event {
                Event::Start(Tag::Heading { .. }) => {
                    flush(&mut current, &mut line);
                    sections.push(std::mem::take(&mut current));
                    heading = Some(String::new());
                }
                Event::End(TagEnd::Heading(_)) => {
                    current.heading = heading.take().filter(|h| !h.is_empty());
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    flush(&mut current, &mut line);
                    in_code_block = true;
                }
                Event::End(TagEnd::CodeBlock) => {
                    flush(&mut current, &mut line);
                    in_code_block = false;
                }
                Event::Start(Tag::List(_)) => list_depth += 1,
                Event::End(TagEnd::List(_)) => list_depth = list_depth.saturating_sub(1),
                Event::Start(Tag::Item) => {
                    flush(&mut current, &mut line);
                    line.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                    line.push_str("- ");
                }
                Event::End(TagEnd::Item | TagEnd::Paragraph) | Event::HardBreak => {
                    flush(&mut current, &mut line);
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some(h) = heading.as_mut() {
                        h.push_str(&text);
                    } else if in_code_block {
                        for code_line in text.lines() {
                            current.lines.push(format!("    {code_line}"));
                        }
                    } else {
                        line.push_str(&text);
                    }
                }
                Event::SoftBreak => line.push(' '),
                _ => {}
            }
        }

        flush(&mut current, &mut line);
        sections.push(current);
        sections.retain(|s| !s.is_empty());
        sections
    }
}

fn flush(section: &mut Section, line: &mut String) {
    let trimmed = line.trim_end();
    if !trimmed.is_empty() && trimmed != "-" {
        section.lines.push(trimmed.to_string());
    }
    line.clear();
}

impl Renderer for MarkdownRenderer {
    fn name(&self) -> &str {
        MARKDOWN
    }

    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError> {
        let PreviewContent::Markdown(source) = content else {
            return Err(RenderError::unsupported(self, content));
        };

        let mut view = View::new(MARKDOWN).with_title_opt(ctx.title.as_deref());
        for section in Self::sections(source) {
            view.push(section);
        }
        Ok(view)
    }
}
