//! Built-in renderers
//!
//! - Markdown text via pulldown-cmark
//! - Binary documents (PDF and others) described by metadata
//! - Architecture diagrams as component/connection listings
//! - Arbitrary JSON preview data
//! - The three diff envelope kinds

mod diagram;
mod diff;
mod document;
mod markdown;

pub use diagram::DiagramRenderer;
pub use diff::{ProgressionRenderer, SimilarityRenderer, SubsetRenderer};
pub use document::{BinaryRenderer, JsonRenderer};
pub use markdown::MarkdownRenderer;
