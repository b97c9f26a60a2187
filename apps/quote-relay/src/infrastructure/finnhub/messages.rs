//! Finnhub WebSocket Message Types
//!
//! Wire types for the Finnhub trade stream. Inbound frames are JSON text
//! with a `type` discriminator; only `"trade"` batches carry data the
//! relay cares about, everything else (`ping`, acks) is ignored.
//!
//! # References
//!
//! - [Trades endpoint](https://finnhub.io/docs/api/websocket-trades)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inbound frame envelope.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"trade","data":[{"s":"AAPL","p":189.955,"t":1700000000000}]}
/// {"type":"ping"}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TradeMessage {
    /// Frame type discriminator.
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Trade records. Absent on non-trade frames.
    #[serde(default)]
    pub data: Vec<TradeTick>,
}

impl TradeMessage {
    /// Whether this frame is a trade batch.
    #[must_use]
    pub fn is_trade(&self) -> bool {
        self.msg_type == "trade"
    }
}

/// One trade record inside a `"trade"` batch.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeTick {
    /// Ticker symbol.
    #[serde(rename = "s", default)]
    pub symbol: String,

    /// Last trade price.
    #[serde(rename = "p", default)]
    pub price: Decimal,

    /// Trade timestamp in epoch milliseconds.
    #[serde(rename = "t", default)]
    pub timestamp_ms: i64,
}

/// Outbound subscribe directive, one per symbol.
///
/// The upstream keeps no subscription state across connections, so the
/// full directive list is re-sent after every reconnect.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"subscribe","symbol":"AAPL"}
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    /// Directive type, always `"subscribe"`.
    #[serde(rename = "type")]
    pub msg_type: &'static str,

    /// Symbol to stream trades for.
    pub symbol: String,
}

impl SubscribeRequest {
    /// Build a subscribe directive for one symbol.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            msg_type: "subscribe",
            symbol: symbol.into(),
        }
    }
}
