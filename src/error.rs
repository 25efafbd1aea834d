//! Error types for the broadcast hub.
//!
//! Nothing in the hub core is fatal: a [`DeliveryError`] is absorbed at the
//! eviction boundary and a [`HubError`] only ever fails the single call that
//! produced it. Startup and CLI failures use `anyhow` instead.

use thiserror::Error;

/// Failure to hand a frame to one subscriber.
///
/// Every variant results in the subscriber being evicted from its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The consuming side of the connection is gone.
    #[error("subscriber closed")]
    Closed,

    /// The subscriber's buffer is full; it stopped draining frames.
    #[error("subscriber buffer full")]
    Lagging,
}

/// Errors surfaced by hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// An inbound duplex frame was not valid JSON. Only that frame is dropped.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    /// An outbound event could not be encoded.
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type HubResult<T> = Result<T, HubError>;
