//! Quote Event Types
//!
//! The canonical trade-price event produced by the upstream codec, and
//! the payload shape pushed to subscriber sinks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Name of the event pushed to subscriber sinks.
pub const QUOTE_EVENT: &str = "quote";

/// A normalized trade-price observation for a single symbol.
///
/// Immutable once constructed. Instances are produced only by the
/// upstream codec, which guarantees a non-empty symbol, a positive price
/// rounded to two fractional digits, and a UTC timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteEvent {
    /// Upstream ticker symbol.
    pub symbol: String,
    /// Last trade price, rounded to 2 decimal places.
    pub price: Decimal,
    /// Trade timestamp in UTC.
    pub observed_at: DateTime<Utc>,
}

impl QuoteEvent {
    /// Build the wire payload for the [`QUOTE_EVENT`] push to subscribers.
    #[must_use]
    pub fn to_frame(&self) -> QuoteFrame {
        QuoteFrame {
            symbol: self.symbol.clone(),
            price: self.price,
            timestamp_utc: self.observed_at,
        }
    }
}

/// Payload of the named `"quote"` event delivered to subscribers.
///
/// # Wire Format (JSON)
/// ```json
/// {"symbol":"AAPL","price":189.96,"timestampUtc":"2023-11-14T22:13:20Z"}
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFrame {
    /// Ticker symbol.
    pub symbol: String,
    /// Price as a plain JSON number with two fixed decimals.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// ISO-8601 UTC timestamp of the trade.
    pub timestamp_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_event() -> QuoteEvent {
        QuoteEvent {
            symbol: "AAPL".to_string(),
            price: Decimal::new(18996, 2),
            observed_at: Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap(),
        }
    }

    #[test]
    fn frame_serializes_with_camel_case_and_numeric_price() {
        let json = serde_json::to_string(&sample_event().to_frame()).unwrap();
        assert_eq!(
            json,
            r#"{"symbol":"AAPL","price":189.96,"timestampUtc":"2023-11-14T22:13:20Z"}"#
        );
    }

    #[test]
    fn event_name_is_quote() {
        assert_eq!(QUOTE_EVENT, "quote");
    }

    #[test]
    fn events_with_same_fields_are_equal() {
        assert_eq!(sample_event(), sample_event());
    }
}
