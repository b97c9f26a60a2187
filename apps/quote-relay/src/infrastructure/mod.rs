//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations behind the application-layer contracts.

/// Finnhub websocket client adapter (connection manager, codec, backoff).
pub mod finnhub;

/// Fan-out hub distributing quote events to subscriber sinks.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber setup.
pub mod telemetry;
