//! HITL Preview Rendering
//!
//! Decouples "what kind of content is this" from "how is it drawn".
//!
//! # Core Concepts
//!
//! - [`Renderer`]: Trait implemented by every preview kind
//! - [`RendererRegistry`]: Content-type keyed dispatch table (last write wins)
//! - [`PreviewContent`]: The content handed to a renderer
//! - [`View`]: Presentation-neutral render output
//!
//! Diff content dispatches on the envelope's `type`; the proposal type travels
//! along in [`RenderContext`] for renderers that need a finer split.
//!
//! # Example
//!
//! ```rust,ignore
//! use hitl_render::{PreviewContent, RenderContext, RendererRegistry};
//!
//! let registry = RendererRegistry::with_defaults();
//! let view = registry.render(
//!     &PreviewContent::Diff(envelope),
//!     &RenderContext::new().with_proposal_type("classify_intent"),
//! );
//! println!("{}", view.to_text());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod builtin;
mod registry;
mod renderer;
mod view;

pub use registry::RendererRegistry;
pub use renderer::{
    ArchitectureDiagram, DiagramEdge, DiagramNode, PreviewContent, RenderContext, RenderError,
    Renderer, BINARY, DIAGRAM, JSON, MARKDOWN, PDF,
};
pub use view::{Section, View};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
