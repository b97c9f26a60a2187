//! Domain Layer - Core relay types.
//!
//! Pure types for quote events and the watched symbol set. No transport
//! or runtime concerns live here.

/// Normalized quote events and the outbound wire payload.
pub mod quote;

/// The ordered, deduplicated set of symbols to watch upstream.
pub mod watchlist;
