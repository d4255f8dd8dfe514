//! HITL Core - proposal review engine
//!
//! Collects AI-generated proposals from a live interrupt stream and a
//! persisted record store, tracks each one through its approval lifecycle,
//! and applies the reviewer's decision back to the backend under the right
//! tenant.
//!
//! # Core Concepts
//!
//! - [`ScopeSynchronizer`]: Single writer of the active (org, project) scope
//! - [`ProposalAggregator`]: Merges both sources into one de-duplicated list
//! - [`DecisionLifecycle`]: `Pending -> Processing -> {Approved, Rejected}` with rollback
//! - [`ReviewEngine`]: All of the above wired over one backend
//!
//! # Example
//!
//! ```rust,ignore
//! use hitl_core::{Decision, ReviewConfig, ReviewEngine, ScopeResolver, MemoryFallbackStore};
//! use std::sync::Arc;
//!
//! let engine = ReviewEngine::new(
//!     ReviewConfig::default(),
//!     backend,
//!     stream,
//!     ScopeResolver::new(Arc::new(MemoryFallbackStore::new())),
//! );
//! engine.mount(Some("/org/acme/o1/project/atlas/p1"));
//!
//! for item in engine.refresh().await {
//!     println!("{} {}", item.id, item.title);
//! }
//! engine.decide("i1-0", Decision::approve()).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod aggregator;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod interrupt;
pub mod lifecycle;
pub mod preview;
pub mod proposal;
pub mod record;
pub mod scope;

pub use aggregator::{
    live_items, merge, merge_with, persisted_items, AggregatorSettings, ProposalAggregator,
    ProposalSink,
};
pub use backend::{
    ApplyItem, ApplyRequest, ApplyResponse, ApplyStatus, DecisionBackend, InterruptStream,
};
pub use config::{FallbackKeys, ReviewConfig};
pub use engine::ReviewEngine;
pub use error::{BackendError, ConfigError, Result, ReviewError, StoreError};
pub use interrupt::{
    ActionRequest, DecisionType, Interrupt, InterruptSet, InterruptValue, ResumeDecision,
    ResumePayload,
};
pub use lifecycle::{
    ApplyFamily, Decision, DecisionLifecycle, DecisionOutcome, EditSession, LifecycleSettings,
    SessionState,
};
pub use preview::{render_item, try_render_item};
pub use proposal::{
    proposal_label, Args, IdentityKey, ProposalItem, ProposalOrigin, ProposalPayload,
    ProposalStatus,
};
pub use record::DecisionRecord;
pub use scope::{
    parse_route, ChangeOrigin, FallbackChange, FallbackStore, FileFallbackStore,
    MemoryFallbackStore, RouteForm, RouteScope, RouteSegment, ScopeContext, ScopeHandle,
    ScopeResolver, ScopeSnapshot, ScopeSynchronizer, SessionProvider, StaticSession,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with HITL Core
    pub use crate::{
        Decision, DecisionOutcome, ProposalItem, ProposalStatus, ReviewConfig, ReviewEngine,
        ReviewError, ScopeContext,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
