//! Shared types and error taxonomy for the Vandamme gateway.
//!
//! This crate sits at the bottom of the workspace: it knows about provider
//! configuration, the resolution result shape, and the error enum, but
//! nothing about HTTP, alias storage, or wire-format conversion. Every other
//! crate in the workspace depends on this one; it depends on nothing
//! internal.

pub mod error;
pub mod model;
pub mod provider;

pub use error::{GatewayError, SseErrorBody, SseErrorEvent};
pub use model::{ResolutionResult, ResolvedTarget};
pub use provider::{ApiFormat, LoadResult, ProviderConfig, PASSTHROUGH_SENTINEL};

/// Generate an opaque request id with at least 16 bits of entropy, used to
/// correlate logs and the SSE frames of one streamed response.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
