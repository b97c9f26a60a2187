//! Relay Configuration Settings
//!
//! Configuration types loaded from environment variables at startup.
//! Every setting except the access token has a default; a missing or
//! empty token does not fail the load, it halts ingestion later (the
//! rest of the service, health endpoints included, keeps running).

use std::time::Duration;

/// Upstream access credential.
///
/// Redacted in `Debug` output so it can never leak through logging.
#[derive(Clone, Default)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Whether the token is missing or blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The raw token, for building the connect URL only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// Websocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Upstream websocket URL (token is appended as a query parameter).
    pub url: String,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            url: "wss://ws.finnhub.io".to_string(),
            reconnect_delay_initial: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
        }
    }
}

/// Fan-out settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Bounded queue depth per subscriber sink.
    pub sink_queue_capacity: usize,
    /// Budget for a single delivery before the sink is detached.
    pub delivery_timeout: Duration,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            sink_queue_capacity: 256,
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (also serves Prometheus metrics).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8082 }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream access token.
    pub token: AccessToken,
    /// Symbols to subscribe to, in order, deduplicated.
    pub symbols: Vec<String>,
    /// Websocket connection settings.
    pub websocket: WebSocketSettings,
    /// Fan-out settings.
    pub broadcast: BroadcastSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

/// Symbols streamed when `QUOTE_RELAY_SYMBOLS` is not set.
const DEFAULT_SYMBOLS: &str = "AAPL,MSFT,GOOG,AMZN,TSLA";

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable optional values fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let token = AccessToken::new(std::env::var("FINNHUB_API_KEY").unwrap_or_default());

        let symbols = parse_symbols(
            &std::env::var("QUOTE_RELAY_SYMBOLS").unwrap_or_else(|_| DEFAULT_SYMBOLS.to_string()),
        );

        let websocket = WebSocketSettings {
            url: std::env::var("QUOTE_RELAY_UPSTREAM_URL")
                .unwrap_or_else(|_| WebSocketSettings::default().url),
            reconnect_delay_initial: parse_env_duration_millis(
                "QUOTE_RELAY_RECONNECT_DELAY_INITIAL_MS",
                WebSocketSettings::default().reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "QUOTE_RELAY_RECONNECT_DELAY_MAX_SECS",
                WebSocketSettings::default().reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "QUOTE_RELAY_RECONNECT_DELAY_MULTIPLIER",
                WebSocketSettings::default().reconnect_delay_multiplier,
            ),
        };

        let broadcast = BroadcastSettings {
            sink_queue_capacity: parse_env_usize(
                "QUOTE_RELAY_SINK_QUEUE_CAPACITY",
                BroadcastSettings::default().sink_queue_capacity,
            ),
            delivery_timeout: parse_env_duration_secs(
                "QUOTE_RELAY_DELIVERY_TIMEOUT_SECS",
                BroadcastSettings::default().delivery_timeout,
            ),
        };

        let server = ServerSettings {
            health_port: parse_env_u16(
                "QUOTE_RELAY_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        Self {
            token,
            symbols,
            websocket,
            broadcast,
            server,
        }
    }
}

/// Split a comma-separated symbol list, trimming entries and dropping
/// blanks and duplicates while preserving first positions.
fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let symbol = part.trim();
        if symbol.is_empty() || symbols.iter().any(|s| s == symbol) {
            continue;
        }
        symbols.push(symbol.to_string());
    }
    symbols
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_redacted_in_debug_output() {
        let token = AccessToken::new("super-secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn blank_token_counts_as_empty() {
        assert!(AccessToken::new("").is_empty());
        assert!(AccessToken::new("   ").is_empty());
        assert!(!AccessToken::new("abc").is_empty());
    }

    #[test]
    fn symbols_are_trimmed_deduplicated_and_ordered() {
        let symbols = parse_symbols(" AAPL , MSFT,AAPL,, TSLA ");
        assert_eq!(symbols, vec!["AAPL", "MSFT", "TSLA"]);
    }

    #[test]
    fn default_symbol_list_matches_seed() {
        let symbols = parse_symbols(DEFAULT_SYMBOLS);
        assert_eq!(symbols, vec!["AAPL", "MSFT", "GOOG", "AMZN", "TSLA"]);
    }

    #[test]
    fn websocket_settings_defaults() {
        let settings = WebSocketSettings::default();
        assert_eq!(settings.url, "wss://ws.finnhub.io");
        assert_eq!(settings.reconnect_delay_initial, Duration::from_secs(1));
        assert_eq!(settings.reconnect_delay_max, Duration::from_secs(30));
        assert!((settings.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn broadcast_settings_defaults() {
        let settings = BroadcastSettings::default();
        assert_eq!(settings.sink_queue_capacity, 256);
        assert_eq!(settings.delivery_timeout, Duration::from_secs(5));
    }

    #[test]
    fn server_settings_defaults() {
        assert_eq!(ServerSettings::default().health_port, 8082);
    }
}
