//! Reconnection Policy
//!
//! Exponential backoff between reconnect attempts. The delay starts at a
//! configured initial value, doubles on every consecutive failure, and is
//! capped at a maximum. The policy resets only once a connection reaches
//! the streaming state, never earlier in the handshake.
//!
//! With the default configuration the delay sequence is exactly
//! 1s, 2s, 4s, 8s, 16s, 30s, 30s, ... (jitter is off by default).

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
    /// Growth factor per consecutive failure. Must be finite and >= 1.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = up to 10% either way).
    /// Zero disables jitter.
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

/// Exponential backoff state for one connection loop.
///
/// Attempts are unbounded; only shutdown stops the reconnect loop.
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl BackoffPolicy {
    /// Create a policy starting at the configured initial delay.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next attempt, doubling for the one after.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);
        let delay = self.apply_jitter(self.current_delay);
        self.current_delay = self
            .current_delay
            .mul_f64(self.config.multiplier)
            .min(self.config.max_delay);
        delay
    }

    /// Reset after a successful entry into the streaming state.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Consecutive failed attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, base: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return base;
        }
        let span = base.as_secs_f64() * self.config.jitter_factor;
        let offset: f64 = rand::rng().random_range(-span..=span);
        Duration::from_secs_f64((base.as_secs_f64() + offset).max(0.001))
    }
}
