//! Application Services
//!
//! Orchestration between the upstream client and the fan-out hub.
//!
//! - [`UpstreamStatus`]: lock-free readout of the connection lifecycle
//!   for health reporting. Written only by the event router.
//! - [`route_events`]: the pump that forwards normalized quotes into the
//!   broadcaster and keeps the status readout current.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::infrastructure::broadcast::QuoteBroadcaster;
use crate::infrastructure::finnhub::{ConnectionState, UpstreamEvent};
use crate::infrastructure::metrics;

// =============================================================================
// Upstream Status
// =============================================================================

/// Observable mirror of the upstream connection lifecycle.
///
/// The connection manager's state machine stays private to its task; this
/// readout is updated from the events it emits and is safe to read from
/// any task.
#[derive(Debug, Default)]
pub struct UpstreamStatus {
    state: AtomicU8,
    quotes_relayed: AtomicU64,
    decode_errors: AtomicU64,
    reconnect_attempts: AtomicU32,
    halted: AtomicBool,
}

impl UpstreamStatus {
    /// Create a fresh readout in the disconnected state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::Relaxed) {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Subscribing,
            3 => ConnectionState::Streaming,
            4 => ConnectionState::Backoff,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Whether the upstream is currently streaming.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state() == ConnectionState::Streaming
    }

    /// Total quotes forwarded to the broadcaster.
    #[must_use]
    pub fn quotes_relayed(&self) -> u64 {
        self.quotes_relayed.load(Ordering::Relaxed)
    }

    /// Total upstream frames dropped as undecodable.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Consecutive reconnect attempts observed so far.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Whether ingestion halted permanently (missing credential).
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Relaxed)
    }

    /// Mark ingestion as permanently halted for this process lifetime.
    pub fn mark_halted(&self) {
        self.halted.store(true, Ordering::Relaxed);
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        let value = match state {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Subscribing => 2,
            ConnectionState::Streaming => 3,
            ConnectionState::Backoff => 4,
        };
        self.state.store(value, Ordering::Relaxed);
    }
}

// =============================================================================
// Event Router
// =============================================================================

/// Forward upstream events into the fan-out hub and status readout.
///
/// Runs until the upstream client drops its sender. Publishing never
/// awaits, so this loop keeps pace with the receive loop even when
/// subscribers stall.
pub async fn route_events(
    mut events: mpsc::Receiver<UpstreamEvent>,
    broadcaster: Arc<QuoteBroadcaster>,
    status: Arc<UpstreamStatus>,
) {
    while let Some(event) = events.recv().await {
        match event {
            UpstreamEvent::Streaming { symbols } => {
                status.set_state(ConnectionState::Streaming);
                status.reconnect_attempts.store(0, Ordering::Relaxed);
                tracing::info!(symbols = symbols.len(), "upstream streaming");
            }
            UpstreamEvent::Disconnected => {
                status.set_state(ConnectionState::Disconnected);
                tracing::warn!("upstream disconnected");
            }
            UpstreamEvent::Reconnecting { attempt, delay } => {
                status.set_state(ConnectionState::Backoff);
                status.reconnect_attempts.store(attempt, Ordering::Relaxed);
                metrics::record_reconnect();
                tracing::info!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "reconnecting to upstream"
                );
            }
            UpstreamEvent::Quote(quote) => {
                status.quotes_relayed.fetch_add(1, Ordering::Relaxed);
                let queued = broadcaster.publish(&quote);
                metrics::record_quotes_relayed(queued);
            }
            UpstreamEvent::DecodeError(reason) => {
                status.decode_errors.fetch_add(1, Ordering::Relaxed);
                metrics::record_decode_error();
                tracing::debug!(%reason, "dropped undecodable upstream frame");
            }
        }
    }
    tracing::debug!("upstream event channel closed");
}
