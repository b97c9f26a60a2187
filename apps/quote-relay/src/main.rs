//! Quote Relay Binary
//!
//! Starts the trade-price relay service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quote-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required for ingestion
//! - `FINNHUB_API_KEY`: Finnhub websocket token. Without it the relay
//!   keeps serving health endpoints but never starts streaming.
//!
//! ## Optional
//! - `QUOTE_RELAY_SYMBOLS`: Comma-separated symbol list (default: AAPL,MSFT,GOOG,AMZN,TSLA)
//! - `QUOTE_RELAY_UPSTREAM_URL`: Upstream websocket URL (default: wss://ws.finnhub.io)
//! - `QUOTE_RELAY_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `QUOTE_RELAY_SINK_QUEUE_CAPACITY`: Per-sink queue depth (default: 256)
//! - `QUOTE_RELAY_DELIVERY_TIMEOUT_SECS`: Per-delivery budget (default: 5)
//! - `QUOTE_RELAY_RECONNECT_DELAY_INITIAL_MS`: Initial backoff delay (default: 1000)
//! - `QUOTE_RELAY_RECONNECT_DELAY_MAX_SECS`: Backoff cap (default: 30)
//! - `QUOTE_RELAY_RECONNECT_DELAY_MULTIPLIER`: Backoff growth factor (default: 2.0)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use quote_relay::infrastructure::telemetry;
use quote_relay::{
    BackoffConfig, BroadcastConfig, HealthServer, HealthServerState, QuoteBroadcaster, RelayConfig,
    UpstreamClient, UpstreamClientConfig, UpstreamEvent, UpstreamStatus, Watchlist, init_metrics,
    route_events,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    telemetry::init();

    tracing::info!("starting quote relay");

    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env();
    log_config(&config);

    let shutdown = CancellationToken::new();

    let watchlist = Arc::new(Watchlist::new(config.symbols.clone()));
    let broadcaster = Arc::new(QuoteBroadcaster::new(
        BroadcastConfig::from(config.broadcast.clone()),
        shutdown.clone(),
    ));
    let status = Arc::new(UpstreamStatus::new());

    // Upstream events flow through one channel into the router, which
    // fans quotes out and keeps the status readout current.
    let (event_tx, event_rx) = mpsc::channel::<UpstreamEvent>(1024);

    let router_broadcaster = Arc::clone(&broadcaster);
    let router_status = Arc::clone(&status);
    tokio::spawn(async move {
        route_events(event_rx, router_broadcaster, router_status).await;
    });

    let client = UpstreamClient::new(
        UpstreamClientConfig {
            url: config.websocket.url.clone(),
            token: config.token.clone(),
            backoff: backoff_from(&config),
        },
        Arc::clone(&watchlist),
        event_tx,
        shutdown.clone(),
    );

    let client_status = Arc::clone(&status);
    tokio::spawn(async move {
        if let Err(e) = client.run().await {
            // Fatal only for ingestion: health and metrics stay up so the
            // condition is visible without restarting the process.
            client_status.mark_halted();
            tracing::error!(error = %e, "trade ingestion halted");
        }
    });

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&status),
        Arc::clone(&broadcaster),
    ));
    let health_server = HealthServer::new(config.server.health_port, health_state, shutdown.clone());
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "health server error");
        }
    });

    tracing::info!("quote relay ready");

    await_shutdown(shutdown).await;

    tracing::info!("quote relay stopped");
    Ok(())
}

/// Build the backoff configuration from the websocket settings.
fn backoff_from(config: &RelayConfig) -> BackoffConfig {
    BackoffConfig {
        initial_delay: config.websocket.reconnect_delay_initial,
        max_delay: config.websocket.reconnect_delay_max,
        multiplier: config.websocket.reconnect_delay_multiplier,
        ..BackoffConfig::default()
    }
}

/// Log the parsed configuration. The token never appears here.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        symbols = ?config.symbols,
        upstream_url = %config.websocket.url,
        health_port = config.server.health_port,
        sink_queue_capacity = config.broadcast.sink_queue_capacity,
        token_present = !config.token.is_empty(),
        "configuration loaded"
    );
}

/// Load .env file from the current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel everything.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    shutdown.cancel();
}
