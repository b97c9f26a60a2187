//! Upstream Connection Manager
//!
//! Owns the single websocket connection to the trade stream and drives
//! the connect, subscribe, receive, backoff cycle for the life of the
//! process. The manager task is the only writer of [`ConnectionState`];
//! everything else observes the connection through [`UpstreamEvent`]s.
//!
//! Failure handling follows a strict split:
//!
//! - a missing access token is fatal and halts the loop permanently
//! - transport failures (connect errors, read errors, close frames) feed
//!   the backoff cycle and are never surfaced to subscribers
//! - undecodable frames are dropped and reported; the loop keeps reading

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::TradeCodec;
use super::messages::SubscribeRequest;
use super::reconnect::{BackoffConfig, BackoffPolicy};
use crate::domain::quote::QuoteEvent;
use crate::domain::watchlist::Watchlist;
use crate::infrastructure::config::AccessToken;
use crate::infrastructure::metrics;

// =============================================================================
// Types
// =============================================================================

/// Connection lifecycle states.
///
/// Exactly one value exists per client and only the manager task writes
/// it. `Disconnected` is terminal only on shutdown; transport failures
/// route through `Backoff` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not retrying.
    Disconnected,
    /// Transport connection in progress.
    Connecting,
    /// Connection open; subscribe directives going out.
    Subscribing,
    /// Subscribed and relaying trade frames.
    Streaming,
    /// Waiting out a delay before the next attempt.
    Backoff,
}

impl ConnectionState {
    /// Lowercase name for logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Backoff => "backoff",
        }
    }
}

/// Events emitted by the upstream client.
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// Subscribed to every watched symbol; trade frames are flowing.
    Streaming {
        /// Symbols the subscribe directives covered, in watchlist order.
        symbols: Vec<String>,
    },
    /// The transport dropped; a reconnect will follow.
    Disconnected,
    /// Waiting out a backoff delay before reconnecting.
    Reconnecting {
        /// Consecutive failed attempts so far.
        attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// One normalized trade-price observation.
    Quote(QuoteEvent),
    /// An upstream frame that could not be decoded and was dropped.
    DecodeError(String),
}

/// Errors that end the connection manager.
///
/// Transport failures never appear here; they are recovered internally
/// through backoff.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamClientError {
    /// No access token was configured. The ingestion pipeline halts
    /// without retrying, since no token will appear before a restart.
    #[error("upstream access token is missing or empty")]
    MissingToken,
}

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    /// Websocket URL without the token query parameter.
    pub url: String,
    /// Access token appended to the URL as `?token=...`.
    pub token: AccessToken,
    /// Backoff tuning.
    pub backoff: BackoffConfig,
}

impl UpstreamClientConfig {
    /// Full connect URL including the token. Never log this value.
    #[must_use]
    pub fn connect_url(&self) -> String {
        format!("{}?token={}", self.url, self.token.expose())
    }
}

/// How a live session ended.
enum SessionEnd {
    /// Shutdown was requested; leave the retry loop.
    Cancelled,
    /// Transport-level failure; retry after backoff.
    Failed(String),
}

// =============================================================================
// Client
// =============================================================================

/// Websocket client for the upstream trade stream.
///
/// Create once, then call [`run`](Self::run) from a dedicated task.
pub struct UpstreamClient {
    config: UpstreamClientConfig,
    watchlist: Arc<Watchlist>,
    codec: TradeCodec,
    events: mpsc::Sender<UpstreamEvent>,
    cancel: CancellationToken,
    state: ConnectionState,
}

impl UpstreamClient {
    /// Create a new client.
    #[must_use]
    pub const fn new(
        config: UpstreamClientConfig,
        watchlist: Arc<Watchlist>,
        events: mpsc::Sender<UpstreamEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            watchlist,
            codec: TradeCodec::new(),
            events,
            cancel,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current lifecycle state. Only [`run`](Self::run) mutates it.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run the connection loop until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamClientError::MissingToken`] if no access token
    /// is configured. This is the only error path; transport failures
    /// are retried forever with backoff.
    pub async fn run(mut self) -> Result<(), UpstreamClientError> {
        if self.config.token.is_empty() {
            tracing::error!(
                "upstream access token is not set; trade ingestion is halted until restart"
            );
            return Err(UpstreamClientError::MissingToken);
        }

        let mut backoff = BackoffPolicy::new(self.config.backoff.clone());

        loop {
            if self.cancel.is_cancelled() {
                self.set_state(ConnectionState::Disconnected);
                tracing::info!("upstream client stopped");
                return Ok(());
            }

            match self.session(&mut backoff).await {
                SessionEnd::Cancelled => {
                    self.set_state(ConnectionState::Disconnected);
                    tracing::info!("upstream client stopped");
                    return Ok(());
                }
                SessionEnd::Failed(reason) => {
                    tracing::warn!(error = %reason, "upstream connection lost");
                    let _ = self.events.send(UpstreamEvent::Disconnected).await;

                    self.set_state(ConnectionState::Backoff);
                    let delay = backoff.next_delay();
                    let attempt = backoff.attempt_count();
                    let _ = self
                        .events
                        .send(UpstreamEvent::Reconnecting { attempt, delay })
                        .await;

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            self.set_state(ConnectionState::Disconnected);
                            tracing::info!("upstream client stopped during backoff");
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Connect, subscribe, and stream until cancellation or failure.
    async fn session(&mut self, backoff: &mut BackoffPolicy) -> SessionEnd {
        self.set_state(ConnectionState::Connecting);
        tracing::info!(url = %self.config.url, "connecting to upstream");

        let ws_stream = tokio::select! {
            () = self.cancel.cancelled() => return SessionEnd::Cancelled,
            connected = tokio_tungstenite::connect_async(self.config.connect_url()) => {
                match connected {
                    Ok((stream, _response)) => stream,
                    Err(e) => return SessionEnd::Failed(e.to_string()),
                }
            }
        };

        let (mut write, mut read) = ws_stream.split();

        // The upstream forgets subscriptions across connections, so the
        // whole watchlist is re-asserted on every session.
        self.set_state(ConnectionState::Subscribing);
        let symbols = self.watchlist.current();
        for symbol in &symbols {
            let directive = SubscribeRequest::new(symbol.clone());
            let json = match serde_json::to_string(&directive) {
                Ok(json) => json,
                Err(e) => {
                    return SessionEnd::Failed(format!("failed to serialize subscribe: {e}"));
                }
            };
            tokio::select! {
                () = self.cancel.cancelled() => return SessionEnd::Cancelled,
                sent = write.send(Message::Text(json.into())) => {
                    if let Err(e) = sent {
                        return SessionEnd::Failed(format!("failed to send subscribe: {e}"));
                    }
                }
            }
        }
        tracing::info!(symbols = symbols.len(), "subscribed to upstream trade stream");

        self.set_state(ConnectionState::Streaming);
        backoff.reset();
        let _ = self.events.send(UpstreamEvent::Streaming { symbols }).await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return SessionEnd::Cancelled,
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_frame_received();
                        self.handle_text_frame(&text).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = write.send(Message::Pong(payload)).await {
                            return SessionEnd::Failed(format!("failed to answer ping: {e}"));
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("upstream sent close frame");
                        return SessionEnd::Failed("server closed the connection".to_string());
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames are not part of the trade stream.
                    }
                    Some(Err(e)) => return SessionEnd::Failed(e.to_string()),
                    None => return SessionEnd::Failed("websocket stream ended".to_string()),
                }
            }
        }
    }

    /// Decode one text frame and forward the results.
    ///
    /// Decode failures are contained here: the frame is dropped, the
    /// error is reported on the event channel, and the session goes on.
    async fn handle_text_frame(&self, text: &str) {
        match self.codec.decode(text) {
            Ok(quotes) => {
                for quote in quotes {
                    if self.events.send(UpstreamEvent::Quote(quote)).await.is_err() {
                        tracing::debug!("event receiver dropped; quote discarded");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable upstream frame");
                let _ = self
                    .events
                    .send(UpstreamEvent::DecodeError(e.to_string()))
                    .await;
            }
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = self.state.as_str(), to = next.as_str(), "connection state");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token(token: &str) -> UpstreamClientConfig {
        UpstreamClientConfig {
            url: "wss://ws.finnhub.io".to_string(),
            token: AccessToken::new(token),
            backoff: BackoffConfig::default(),
        }
    }

    #[test]
    fn connect_url_appends_token_query() {
        let config = config_with_token("abc123");
        assert_eq!(config.connect_url(), "wss://ws.finnhub.io?token=abc123");
    }

    #[test]
    fn state_names_are_lowercase() {
        assert_eq!(ConnectionState::Disconnected.as_str(), "disconnected");
        assert_eq!(ConnectionState::Connecting.as_str(), "connecting");
        assert_eq!(ConnectionState::Subscribing.as_str(), "subscribing");
        assert_eq!(ConnectionState::Streaming.as_str(), "streaming");
        assert_eq!(ConnectionState::Backoff.as_str(), "backoff");
    }

    #[tokio::test]
    async fn missing_token_is_fatal_without_retries() {
        let (tx, mut rx) = mpsc::channel(8);
        let client = UpstreamClient::new(
            config_with_token("   "),
            Arc::new(Watchlist::new(["AAPL"])),
            tx,
            CancellationToken::new(),
        );

        let result = client.run().await;
        assert!(matches!(result, Err(UpstreamClientError::MissingToken)));

        // No connection attempt was made, so no events were emitted.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_client_starts_disconnected() {
        let (tx, _rx) = mpsc::channel(8);
        let client = UpstreamClient::new(
            config_with_token("abc"),
            Arc::new(Watchlist::new(["AAPL"])),
            tx,
            CancellationToken::new(),
        );
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
