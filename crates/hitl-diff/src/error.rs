//! Diff envelope contract violations

/// A diff envelope whose declared shape disagrees with its contents
///
/// These are data-contract defects on the producer side. Consumers log them
/// and keep rendering what they can.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiffShapeError {
    /// A stats counter does not match its partition bucket
    #[error("{field} is {declared} but partition holds {actual}")]
    CountMismatch {
        /// Counter name (`addedCount`, ...)
        field: &'static str,
        /// Value declared in `stats`
        declared: usize,
        /// Length of the partition bucket
        actual: usize,
    },

    /// Recommended similarity option does not exist
    #[error("recommended index {index} out of range for {options} options")]
    RecommendedOutOfRange {
        /// Declared recommended index
        index: usize,
        /// Number of options present
        options: usize,
    },

    /// Percentage outside 0..=100
    #[error("{field} must be within 0..=100, got {value}")]
    PercentageOutOfRange {
        /// Metadata field name
        field: &'static str,
        /// Offending value
        value: f64,
    },
}

impl DiffShapeError {
    /// Whether this violation concerns the stats/partition invariant
    #[inline]
    #[must_use]
    pub fn is_count_mismatch(&self) -> bool {
        matches!(self, Self::CountMismatch { .. })
    }
}
