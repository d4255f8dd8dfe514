//! Renderers for the three diff envelope kinds

use crate::renderer::{PreviewContent, RenderContext, RenderError, Renderer};
use crate::view::{Section, View};
use hitl_diff::{DiffEntity, DiffEnvelope, DiffKind, DiffStats, Partition, ProgressionDirection};

const BAR_WIDTH: usize = 20;

fn entity_lines<'a>(
    marker: &'a str,
    entities: &'a [DiffEntity],
) -> impl Iterator<Item = String> + 'a {
    entities
        .iter()
        .map(move |e| format!("{marker} {}", e.display_name()))
}

fn partition_sections(partition: &Partition, stats: &DiffStats) -> Vec<Section> {
    vec![
        Section::titled(format!("Added ({})", stats.added_count))
            .lines(entity_lines("+", &partition.added)),
        Section::titled(format!("Removed ({})", stats.removed_count))
            .lines(entity_lines("-", &partition.removed)),
        Section::titled(format!("Modified ({})", stats.modified_count)).lines(
            partition.modified.iter().map(|m| {
                if m.changed_fields.is_empty() {
                    format!("~ {}", m.right.display_name())
                } else {
                    format!("~ {} ({})", m.right.display_name(), m.changed_fields.join(", "))
                }
            }),
        ),
    ]
    .into_iter()
    .filter(|s| !s.lines.is_empty())
    .collect()
}

fn base_view(kind: DiffKind, diff: &DiffEnvelope, ctx: &RenderContext) -> View {
    let title = diff.header().title.as_deref().or(ctx.title.as_deref());
    let mut view = View::new(kind.as_str()).with_title_opt(title);
    if let Some(description) = &diff.header().description {
        view.push(Section::untitled().line(description.clone()));
    }
    view
}

/// Subset diffs: which entities survive a filtering decision
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetRenderer;

impl SubsetRenderer {
    /// Side captions, varied by proposal type
    #[must_use]
    pub fn side_labels(proposal_type: Option<&str>) -> (&'static str, &'static str) {
        match proposal_type {
            Some(t) if t.starts_with("classify") => ("Candidates", "Selected"),
            Some(t) if t.contains("organization") => ("Current members", "Proposed members"),
            Some(t) if t.contains("standard") || t.contains("requirement") => {
                ("Applicable", "Retained")
            }
            _ => ("Before", "After"),
        }
    }
}

impl Renderer for SubsetRenderer {
    fn name(&self) -> &str {
        DiffKind::Subset.as_str()
    }

    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError> {
        let PreviewContent::Diff(envelope @ DiffEnvelope::Subset(diff)) = content else {
            return Err(RenderError::unsupported(self, content));
        };

        let (left, right) = Self::side_labels(ctx.proposal_type.as_deref());
        let subset = &diff.metadata.subset;
        let mut view = base_view(DiffKind::Subset, envelope, ctx);

        view.push(
            Section::titled("Summary")
                .line(format!("{left}: {}", diff.stats.total_left))
                .line(format!("{right}: {}", diff.stats.total_right))
                .line(format!(
                    "active {} / inactive {} ({:.0}% reduction)",
                    subset.active_count, subset.inactive_count, subset.reduction_percentage
                )),
        );
        for section in partition_sections(&diff.diff, &diff.stats) {
            view.push(section);
        }
        Ok(view)
    }
}

/// Progression diffs: how far a staged process advanced
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressionRenderer;

impl ProgressionRenderer {
    /// Text progress bar, clamped to 0..=100
    #[must_use]
    pub fn bar(percentage: f64) -> String {
        let clamped = percentage.clamp(0.0, 100.0);
        let filled = ((clamped / 100.0) * BAR_WIDTH as f64).round() as usize;
        format!(
            "[{}{}] {clamped:.0}%",
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH - filled)
        )
    }
}

impl Renderer for ProgressionRenderer {
    fn name(&self) -> &str {
        DiffKind::Progression.as_str()
    }

    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError> {
        let PreviewContent::Diff(envelope @ DiffEnvelope::Progression(diff)) = content else {
            return Err(RenderError::unsupported(self, content));
        };

        let progression = &diff.metadata.progression;
        let direction = match progression.direction {
            ProgressionDirection::Forward => "forward",
            ProgressionDirection::Backward => "backward",
            ProgressionDirection::Unchanged => "no change",
        };

        let mut view = base_view(DiffKind::Progression, envelope, ctx);
        view.push(
            Section::titled("Progress")
                .line(Self::bar(progression.completion_percentage))
                .line(format!(
                    "{} added, {} remaining ({direction})",
                    progression.items_added, progression.items_remaining
                )),
        );
        for section in partition_sections(&diff.diff, &diff.stats) {
            view.push(section);
        }
        Ok(view)
    }
}

/// Similarity diffs: N candidate options side by side
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityRenderer;

impl Renderer for SimilarityRenderer {
    fn name(&self) -> &str {
        DiffKind::Similarity.as_str()
    }

    fn render(&self, content: &PreviewContent, ctx: &RenderContext) -> Result<View, RenderError> {
        let PreviewContent::Diff(envelope @ DiffEnvelope::Similarity(diff)) = content else {
            return Err(RenderError::unsupported(self, content));
        };

        let mut view = base_view(DiffKind::Similarity, envelope, ctx);
        for option in &diff.options {
            let heading = if option.index == diff.recommended_index {
                format!("Option {} (recommended)", option.index.saturating_add(1))
            } else {
                format!("Option {}", option.index.saturating_add(1))
            };
            let verdict = if option.validation.passed { "passed" } else { "failed" };
            view.push(
                Section::titled(heading)
                    .line(option.summary.clone())
                    .line(format!(
                        "compliance {:.0}%, validation {verdict}",
                        option.compliance_score * 100.0
                    ))
                    .lines(option.validation.issues.iter().map(|i| format!("! {i}"))),
            );
        }
        for section in partition_sections(&diff.diff, &diff.stats) {
            view.push(section);
        }
        Ok(view)
    }
}
