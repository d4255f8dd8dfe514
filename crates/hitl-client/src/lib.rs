//! HITL Client - HTTP access to the decision backend
//!
//! [`HttpBackend`] implements [`hitl_core::DecisionBackend`] and
//! [`HttpInterruptStream`] implements [`hitl_core::InterruptStream`]. Every
//! request carries the bearer token from the session and the active
//! organization in the `X-Organization-Context` header.
//!
//! # Example
//!
//! ```rust,ignore
//! use hitl_client::{HttpBackend, HttpInterruptStream};
//! use hitl_core::StaticSession;
//! use std::sync::Arc;
//!
//! let session = Arc::new(StaticSession::anonymous().with_token(token));
//! let backend = HttpBackend::new("http://localhost:8000", session.clone())?;
//! let records = backend.list(&scope).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod http;

pub use error::{error_detail, ClientError};
pub use http::{HttpBackend, HttpInterruptStream, ORG_CONTEXT_HEADER};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
