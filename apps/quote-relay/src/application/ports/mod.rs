//! Port Interfaces
//!
//! Contracts between the relay core and external systems.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`QuoteSink`]: push capability for delivering quote events to one
//!   attached subscriber, however that subscriber is transported.

use async_trait::async_trait;

use crate::domain::quote::QuoteEvent;

/// Errors a sink reports when a delivery cannot complete.
///
/// Any error detaches the sink; there is no per-delivery retry.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The subscriber's receiving end is gone.
    #[error("sink closed: {0}")]
    Closed(String),

    /// Delivery failed for a transport-specific reason.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Push capability for exactly one subscriber.
///
/// Implementations live in the subscriber transport layer (a websocket
/// hub, an SSE stream, a test collector). `deliver` is awaited from the
/// sink's own delivery task, never from the ingestion path, so a slow
/// implementation only penalizes its own subscriber.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSink: Send + Sync {
    /// Push one quote event to the subscriber.
    async fn deliver(&self, event: QuoteEvent) -> Result<(), SinkError>;
}
