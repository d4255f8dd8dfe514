//! HITL Diff Envelope
//!
//! The data contract between the proposal backend and the review surface for
//! before/after and N-way comparisons. Diffs are computed upstream; this crate
//! only models and checks them.
//!
//! # Core Concepts
//!
//! - [`DiffEnvelope`]: Closed, `type`-tagged union of the three diff shapes
//! - [`Partition`]: Added/removed/modified/unchanged entity buckets
//! - [`DiffStats`]: Counters every envelope carries
//! - [`DiffShapeError`]: Contract violations reported by [`DiffEnvelope::validate`]
//!
//! # Example
//!
//! ```rust,ignore
//! use hitl_diff::DiffEnvelope;
//!
//! let envelope: DiffEnvelope = serde_json::from_value(payload)?;
//! if let Err(violation) = envelope.validate() {
//!     tracing::warn!(%violation, "diff envelope violates its contract");
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod envelope;
mod error;
mod partition;
mod wire;

pub use envelope::{
    DiffEnvelope, DiffHeader, DiffKind, OptionValidation, ProgressionDiff, ProgressionDirection,
    ProgressionMetadata, ProgressionStats, SimilarityDiff, SimilarityOption, SubsetDiff,
    SubsetMetadata, SubsetStats,
};
pub use error::DiffShapeError;
pub use partition::{DiffEntity, DiffSide, DiffStats, ModifiedEntity, Partition};
pub use wire::null_as_default;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
