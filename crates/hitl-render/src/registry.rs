//! Renderer registry
//!
//! Provides [`RendererRegistry`], the content-type → renderer dispatch table.

use crate::builtin::{
    BinaryRenderer, DiagramRenderer, JsonRenderer, MarkdownRenderer, ProgressionRenderer,
    SimilarityRenderer, SubsetRenderer,
};
use crate::renderer::{PreviewContent, RenderContext, RenderError, Renderer, BINARY, DIAGRAM, JSON, MARKDOWN, PDF};
use crate::view::{Section, View};
use hitl_diff::DiffKind;
use indexmap::IndexMap;
use std::sync::Arc;

/// Content-type keyed renderer table
///
/// Registration under an existing key replaces the renderer (last write
/// wins) and keeps the key's original position in [`Self::content_types`].
#[derive(Debug, Default, Clone)]
pub struct RendererRegistry {
    renderers: IndexMap<String, Arc<dyn Renderer>>,
}

impl RendererRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            renderers: IndexMap::new(),
        }
    }

    /// Create registry with built-in renderers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(MARKDOWN, MarkdownRenderer);

        let binary: Arc<dyn Renderer> = Arc::new(BinaryRenderer);
        registry.register_shared(PDF, Arc::clone(&binary));
        registry.register_shared(BINARY, binary);

        registry.register(DIAGRAM, DiagramRenderer);
        registry.register(JSON, JsonRenderer);
        registry.register(DiffKind::Subset.as_str(), SubsetRenderer);
        registry.register(DiffKind::Progression.as_str(), ProgressionRenderer);
        registry.register(DiffKind::Similarity.as_str(), SimilarityRenderer);
        registry
    }

    /// Register a renderer under a content-type key
    ///
    /// Returns the renderer previously registered under that key.
    pub fn register<R: Renderer + 'static>(
        &mut self,
        key: impl Into<String>,
        renderer: R,
    ) -> Option<Arc<dyn Renderer>> {
        self.register_shared(key, Arc::new(renderer))
    }

    /// Register an already shared renderer
    pub fn register_shared(
        &mut self,
        key: impl Into<String>,
        renderer: Arc<dyn Renderer>,
    ) -> Option<Arc<dyn Renderer>> {
        let key = key.into();
        tracing::debug!(content_type = %key, renderer = renderer.name(), "registering renderer");
        self.renderers.insert(key, renderer)
    }

    /// Look up a renderer
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.get(key).cloned()
    }

    /// Check if a key is registered
    #[inline]
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.renderers.contains_key(key)
    }

    /// Remove a key, preserving the order of the others
    #[inline]
    pub fn unregister(&mut self, key: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.shift_remove(key)
    }

    /// Registered keys in first-registration order
    #[inline]
    #[must_use]
    pub fn content_types(&self) -> Vec<&str> {
        self.renderers.keys().map(String::as_str).collect()
    }

    /// Number of registered keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Render content with the renderer registered for its type
    ///
    /// # Errors
    /// - [`RenderError::Missing`] if no renderer is registered for the type
    /// - [`RenderError::Unsupported`] if the renderer rejects the content
    pub fn try_render(
        &self,
        content: &PreviewContent,
        ctx: &RenderContext,
    ) -> Result<View, RenderError> {
        let key = content.content_type();
        let renderer = self
            .renderers
            .get(key)
            .ok_or_else(|| RenderError::Missing(key.to_string()))?;

        let mut view = renderer.render(content, ctx)?;

        if let PreviewContent::Diff(diff) = content {
            let violations = diff.violations();
            if !violations.is_empty() {
                for violation in &violations {
                    tracing::warn!(
                        diff_type = key,
                        proposal_type = ctx.proposal_type.as_deref().unwrap_or("-"),
                        %violation,
                        "diff envelope violates its contract; rendering best-effort"
                    );
                }
                view.push(
                    Section::titled("Data warnings")
                        .lines(violations.iter().map(ToString::to_string)),
                );
            }
        }

        Ok(view)
    }

    /// Render content, degrading to the "no preview available" view
    #[must_use]
    pub fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> View {
        match self.try_render(content, ctx) {
            Ok(view) => view,
            Err(err) => {
                tracing::warn!(
                    content_type = content.content_type(),
                    error = %err,
                    "falling back to placeholder preview"
                );
                View::fallback(content.content_type()).with_title_opt(ctx.title.as_deref())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    impl Renderer for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn render(&self, _content: &PreviewContent, _ctx: &RenderContext) -> Result<View, RenderError> {
            Ok(View::new(self.0))
        }
    }

    #[test]
    fn registry_new_empty() {
        let registry = RendererRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get(MARKDOWN).is_none());
    }

    #[test]
    fn registry_with_defaults() {
        let registry = RendererRegistry::with_defaults();
        assert_eq!(
            registry.content_types(),
            vec![MARKDOWN, PDF, BINARY, DIAGRAM, JSON, "subset", "progression", "similarity"]
        );
        assert!(registry.has("subset"));
    }

    #[test]
    fn register_overwrites_last_wins() {
        let mut registry = RendererRegistry::new();
        assert!(registry.register("chart", Named("first")).is_none());
        let previous = registry.register("chart", Named("second"));

        assert_eq!(previous.map(|r| r.name().to_string()).as_deref(), Some("first"));
        assert_eq!(registry.get("chart").map(|r| r.name().to_string()).as_deref(), Some("second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn overwrite_keeps_position() {
        let mut registry = RendererRegistry::new();
        registry.register("a", Named("a"));
        registry.register("b", Named("b"));
        registry.register("a", Named("a2"));
        assert_eq!(registry.content_types(), vec!["a", "b"]);
    }

    #[test]
    fn unregister_preserves_order() {
        let mut registry = RendererRegistry::new();
        registry.register("a", Named("a"));
        registry.register("b", Named("b"));
        registry.register("c", Named("c"));
        assert!(registry.unregister("b").is_some());
        assert!(!registry.has("b"));
        assert_eq!(registry.content_types(), vec!["a", "c"]);
    }

    #[test]
    fn missing_renderer_falls_back() {
        let registry = RendererRegistry::new();
        let content = PreviewContent::Markdown("# hi".to_string());

        assert_eq!(
            registry.try_render(&content, &RenderContext::new()),
            Err(RenderError::Missing(MARKDOWN.to_string()))
        );

        let view = registry.render(&content, &RenderContext::new().with_title("Brief"));
        assert!(view.fallback);
        assert_eq!(view.title.as_deref(), Some("Brief"));
    }

    #[test]
    fn unsupported_content_falls_back() {
        let mut registry = RendererRegistry::new();
        registry.register(JSON, MarkdownRenderer);
        let view = registry.render(&PreviewContent::Json(serde_json::json!({"a": 1})), &RenderContext::new());
        assert!(view.fallback);
    }
}
