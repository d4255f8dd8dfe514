//! Tagged diff envelope
//!
//! Provides [`DiffEnvelope`], the closed set of comparison shapes a proposal
//! preview can carry. The tag is the `type` field on the wire.

use crate::error::DiffShapeError;
use crate::partition::{DiffSide, DiffStats, Partition};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Discriminant of a [`DiffEnvelope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Right side is a filtered subset of the left
    Subset,
    /// Right side is a later snapshot of the left
    Progression,
    /// N-way comparison of candidate options
    Similarity,
}

impl DiffKind {
    /// All kinds in declaration order
    pub const ALL: [DiffKind; 3] = [DiffKind::Subset, DiffKind::Progression, DiffKind::Similarity];

    /// Wire tag
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::Subset => "subset",
            DiffKind::Progression => "progression",
            DiffKind::Similarity => "similarity",
        }
    }
}

impl Display for DiffKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Title/description shared by all envelope metadata blocks
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiffHeader {
    /// Short heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Longer explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Subset-specific counters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsetStats {
    /// Entities kept active
    pub active_count: usize,
    /// Entities filtered out
    pub inactive_count: usize,
    /// Share of the left side removed, in percent
    pub reduction_percentage: f64,
}

/// Metadata block of a subset envelope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubsetMetadata {
    /// Heading
    #[serde(flatten)]
    pub header: DiffHeader,
    /// Subset counters
    pub subset: SubsetStats,
}

/// Direction a progression moved in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionDirection {
    /// Closer to completion
    #[default]
    Forward,
    /// Further from completion
    Backward,
    /// No net movement
    Unchanged,
}

/// Progression-specific counters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionStats {
    /// Completion after the change, in percent
    pub completion_percentage: f64,
    /// Items added by this step
    pub items_added: usize,
    /// Items still outstanding
    pub items_remaining: usize,
    /// Net direction
    #[serde(default)]
    pub direction: ProgressionDirection,
}

/// Metadata block of a progression envelope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressionMetadata {
    /// Heading
    #[serde(flatten)]
    pub header: DiffHeader,
    /// Progression counters
    pub progression: ProgressionStats,
}

/// Validation verdict for one similarity option
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptionValidation {
    /// Whether the option satisfies the backend's checks
    #[serde(default)]
    pub passed: bool,
    /// Human-readable findings
    #[serde(
        default,
        deserialize_with = "crate::null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub issues: Vec<String>,
}

/// One candidate in an N-way comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityOption {
    /// Position among the candidates
    pub index: usize,
    /// Short description
    pub summary: String,
    /// Compliance with the governing template, 0.0..=1.0
    pub compliance_score: f64,
    /// Validation verdict
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub validation: OptionValidation,
}

/// Subset comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetDiff {
    /// Full set
    pub left: DiffSide,
    /// Retained subset
    pub right: DiffSide,
    /// Backend-computed split
    pub diff: Partition,
    /// Shared counters
    pub stats: DiffStats,
    /// Subset metadata
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub metadata: SubsetMetadata,
}

/// Progression comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionDiff {
    /// Earlier snapshot
    pub left: DiffSide,
    /// Later snapshot
    pub right: DiffSide,
    /// Backend-computed split
    pub diff: Partition,
    /// Shared counters
    pub stats: DiffStats,
    /// Progression metadata
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub metadata: ProgressionMetadata,
}

/// N-way option comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityDiff {
    /// Candidates
    pub options: Vec<SimilarityOption>,
    /// Index into `options` the backend recommends
    pub recommended_index: usize,
    /// Entity split between the recommended option and the current state
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub diff: Partition,
    /// Shared counters
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub stats: DiffStats,
    /// Heading
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub metadata: DiffHeader,
}

/// Diff payload attached to a proposal
///
/// # Invariants
/// - `stats.addedCount == diff.added.len()` and likewise for the other three
///   buckets, for every variant. [`DiffEnvelope::validate`] reports violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiffEnvelope {
    /// Subset comparison
    Subset(SubsetDiff),
    /// Progression comparison
    Progression(ProgressionDiff),
    /// N-way comparison
    Similarity(SimilarityDiff),
}

impl DiffEnvelope {
    /// Build a subset envelope whose stats agree with `diff`
    #[must_use]
    pub fn subset(left: DiffSide, right: DiffSide, diff: Partition, subset: SubsetStats) -> Self {
        let stats = DiffStats::from_partition(&diff);
        Self::Subset(SubsetDiff {
            left,
            right,
            diff,
            stats,
            metadata: SubsetMetadata {
                header: DiffHeader::default(),
                subset,
            },
        })
    }

    /// Build a progression envelope whose stats agree with `diff`
    #[must_use]
    pub fn progression(
        left: DiffSide,
        right: DiffSide,
        diff: Partition,
        progression: ProgressionStats,
    ) -> Self {
        let stats = DiffStats::from_partition(&diff);
        Self::Progression(ProgressionDiff {
            left,
            right,
            diff,
            stats,
            metadata: ProgressionMetadata {
                header: DiffHeader::default(),
                progression,
            },
        })
    }

    /// Build a similarity envelope with an empty partition
    #[must_use]
    pub fn similarity(options: Vec<SimilarityOption>, recommended_index: usize) -> Self {
        Self::Similarity(SimilarityDiff {
            options,
            recommended_index,
            diff: Partition::default(),
            stats: DiffStats::default(),
            metadata: DiffHeader::default(),
        })
    }

    /// Discriminant
    #[inline]
    #[must_use]
    pub fn kind(&self) -> DiffKind {
        match self {
            Self::Subset(_) => DiffKind::Subset,
            Self::Progression(_) => DiffKind::Progression,
            Self::Similarity(_) => DiffKind::Similarity,
        }
    }

    /// Wire tag, used as the renderer registry key
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Shared counters
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &DiffStats {
        match self {
            Self::Subset(d) => &d.stats,
            Self::Progression(d) => &d.stats,
            Self::Similarity(d) => &d.stats,
        }
    }

    /// Entity split
    #[inline]
    #[must_use]
    pub fn partition(&self) -> &Partition {
        match self {
            Self::Subset(d) => &d.diff,
            Self::Progression(d) => &d.diff,
            Self::Similarity(d) => &d.diff,
        }
    }

    /// Heading block
    #[inline]
    #[must_use]
    pub fn header(&self) -> &DiffHeader {
        match self {
            Self::Subset(d) => &d.metadata.header,
            Self::Progression(d) => &d.metadata.header,
            Self::Similarity(d) => &d.metadata,
        }
    }

    /// Mutable heading block
    #[inline]
    pub fn header_mut(&mut self) -> &mut DiffHeader {
        match self {
            Self::Subset(d) => &mut d.metadata.header,
            Self::Progression(d) => &mut d.metadata.header,
            Self::Similarity(d) => &mut d.metadata,
        }
    }

    /// With heading title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.header_mut().title = Some(title.into());
        self
    }

    /// All contract violations, in a stable order
    #[must_use]
    pub fn violations(&self) -> Vec<DiffShapeError> {
        let mut out = count_violations(self.stats(), self.partition());

        match self {
            Self::Subset(d) => {
                check_percentage(
                    &mut out,
                    "reductionPercentage",
                    d.metadata.subset.reduction_percentage,
                );
            }
            Self::Progression(d) => {
                check_percentage(
                    &mut out,
                    "completionPercentage",
                    d.metadata.progression.completion_percentage,
                );
            }
            Self::Similarity(d) => {
                if !d.options.is_empty() && d.recommended_index >= d.options.len() {
                    out.push(DiffShapeError::RecommendedOutOfRange {
                        index: d.recommended_index,
                        options: d.options.len(),
                    });
                }
            }
        }

        out
    }

    /// Check the envelope against its contract
    ///
    /// # Errors
    /// Returns the first violation found, see [`DiffEnvelope::violations`].
    pub fn validate(&self) -> Result<(), DiffShapeError> {
        match self.violations().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn count_violations(stats: &DiffStats, partition: &Partition) -> Vec<DiffShapeError> {
    let checks = [
        ("addedCount", stats.added_count, partition.added.len()),
        ("removedCount", stats.removed_count, partition.removed.len()),
        ("modifiedCount", stats.modified_count, partition.modified.len()),
        ("unchangedCount", stats.unchanged_count, partition.unchanged.len()),
    ];

    checks
        .into_iter()
        .filter(|(_, declared, actual)| declared != actual)
        .map(|(field, declared, actual)| DiffShapeError::CountMismatch {
            field,
            declared,
            actual,
        })
        .collect()
}

fn check_percentage(out: &mut Vec<DiffShapeError>, field: &'static str, value: f64) {
    if !(0.0..=100.0).contains(&value) {
        out.push(DiffShapeError::PercentageOutOfRange { field, value });
    }
}
