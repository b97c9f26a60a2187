#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Quote Relay - Live Trade-Price Fan-out
//!
//! Maintains a single connection to Finnhub's trade websocket and relays
//! normalized quote events to any number of attached subscriber sinks.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core relay types
//!   - `quote`: normalized quote events and the outbound payload
//!   - `watchlist`: the ordered set of symbols to stream
//!
//! - **Application**: Ports and orchestration
//!   - `ports`: the sink capability subscribers are delivered through
//!   - `services`: event routing and the upstream status readout
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `finnhub`: websocket client, codec, and backoff policy
//!   - `broadcast`: bounded fan-out to subscriber sinks
//!   - `config`: environment configuration
//!   - `health`: health check HTTP endpoint
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: tracing setup
//!
//! # Data Flow
//!
//! ```text
//!                  ┌──────────────┐    ┌──────────┐    ┌─────────┐──► Sink 1
//! Finnhub WS ─────►│   Upstream   │───►│  Event   │───►│ Fan-out │──► Sink 2
//!                  │    Client    │    │  Router  │    │   Hub   │──► Sink N
//!                  └──────────────┘    └──────────┘    └─────────┘
//! ```
//!
//! One stalled sink never slows the others or the receive loop: every
//! sink drains its own bounded queue and is detached when it falls too
//! far behind.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core relay types with no transport concerns.
pub mod domain;

/// Application layer - Ports and orchestration.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::quote::{QUOTE_EVENT, QuoteEvent, QuoteFrame};
pub use domain::watchlist::Watchlist;

// Application ports and services
pub use application::ports::{QuoteSink, SinkError};
pub use application::services::{UpstreamStatus, route_events};

// Upstream client
pub use infrastructure::finnhub::{
    BackoffConfig, BackoffPolicy, CodecError, ConnectionState, TradeCodec, UpstreamClient,
    UpstreamClientConfig, UpstreamClientError, UpstreamEvent,
};

// Fan-out hub
pub use infrastructure::broadcast::{
    BroadcastConfig, QuoteBroadcaster, SharedBroadcaster, SinkHandle,
};

// Configuration
pub use infrastructure::config::{
    AccessToken, BroadcastSettings, RelayConfig, ServerSettings, WebSocketSettings,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;
