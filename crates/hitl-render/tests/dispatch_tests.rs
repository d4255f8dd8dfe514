//! Registry dispatch behaviour seen from outside the crate

use hitl_diff::{DiffEntity, DiffEnvelope, DiffSide, Partition, ProgressionStats};
use hitl_render::{PreviewContent, RenderContext, RenderError, Renderer, RendererRegistry, View};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
struct Recorder {
    name: &'static str,
    calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl Renderer for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.name.to_string(), ctx.proposal_type.clone()));
        Ok(View::new(content.content_type()))
    }
}

fn progression_fifty_percent() -> DiffEnvelope {
    let ids = |p: &str| (0..3).map(|i| DiffEntity::new(format!("{p}{i}"))).collect::<Vec<_>>();
    DiffEnvelope::progression(
        DiffSide::new(ids("old")),
        DiffSide::default(),
        Partition::new().with_added(ids("new")).with_unchanged(ids("old")),
        ProgressionStats {
            completion_percentage: 50.0,
            items_added: 3,
            items_remaining: 3,
            ..ProgressionStats::default()
        },
    )
}

#[test]
fn progression_diff_dispatches_to_progression_renderer() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = RendererRegistry::new();
    for name in ["subset", "progression", "similarity"] {
        registry.register(
            name,
            Recorder {
                name,
                calls: Arc::clone(&calls),
            },
        );
    }

    let envelope = progression_fifty_percent();
    assert_eq!(envelope.stats().added_count, 3);
    assert_eq!(envelope.stats().unchanged_count, 3);

    let view = registry.render(
        &PreviewContent::Diff(envelope),
        &RenderContext::new().with_proposal_type("generate_hydration"),
    );

    assert!(!view.fallback);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "progression");
    assert_eq!(calls[0].1.as_deref(), Some("generate_hydration"));
}

#[test]
fn has_mirrors_registrations() {
    let mut registry = RendererRegistry::new();
    assert!(!registry.has("markdown"));
    registry.register("markdown", Recorder { name: "md", ..Recorder::default() });
    assert!(registry.has("markdown"));
    assert!(!registry.has("pdf"));
}

#[test]
fn invalid_envelope_still_renders_with_warning() {
    let mut envelope = progression_fifty_percent();
    if let DiffEnvelope::Progression(d) = &mut envelope {
        d.stats.added_count = 7;
    }

    let registry = RendererRegistry::with_defaults();
    let view = registry.render(&PreviewContent::Diff(envelope), &RenderContext::new());

    assert!(!view.fallback);
    let warnings = view
        .sections
        .iter()
        .find(|s| s.heading.as_deref() == Some("Data warnings"))
        .expect("warning section");
    assert!(warnings.lines[0].contains("addedCount"));
}
