//! Finnhub WebSocket Adapter
//!
//! Client for Finnhub's real-time trade stream:
//!
//! - **messages**: wire types for inbound trade batches and outbound
//!   subscribe directives
//! - **codec**: decode and validate raw frames into quote events
//! - **reconnect**: exponential backoff policy between attempts
//! - **client**: the connection lifecycle state machine

pub mod client;
pub mod codec;
pub mod messages;
pub mod reconnect;

pub use client::{
    ConnectionState, UpstreamClient, UpstreamClientConfig, UpstreamClientError, UpstreamEvent,
};
pub use codec::{CodecError, TradeCodec};
pub use messages::{SubscribeRequest, TradeMessage, TradeTick};
pub use reconnect::{BackoffConfig, BackoffPolicy};
