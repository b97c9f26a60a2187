//! Quote Fan-out
//!
//! Distributes each published [`QuoteEvent`] to every attached subscriber
//! sink. Each sink owns a bounded queue drained by its own delivery task,
//! so a slow or stuck subscriber can neither delay the other sinks nor
//! block the upstream receive loop.
//!
//! A sink is treated as failed and detached when:
//!
//! - its queue is full at publish time (it fell a whole queue behind)
//! - a single delivery exceeds the configured timeout
//! - its `deliver` call returns an error
//!
//! Delivery is strictly prospective: a sink attached after an event was
//! published never sees that event, and a sink detached before a publish
//! never sees anything from it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::QuoteSink;
use crate::domain::quote::QuoteEvent;
use crate::infrastructure::config::BroadcastSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Configuration
// =============================================================================

/// Tuning for the fan-out hub.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Bounded per-sink queue depth. A sink that falls this many events
    /// behind is detached.
    pub sink_queue_capacity: usize,
    /// Budget for one `deliver` call before the sink is detached.
    pub delivery_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            sink_queue_capacity: 256,
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            sink_queue_capacity: settings.sink_queue_capacity,
            delivery_timeout: settings.delivery_timeout,
        }
    }
}

// =============================================================================
// Fan-out Hub
// =============================================================================

/// Handle returned by [`QuoteBroadcaster::attach`]; pass to
/// [`detach`](QuoteBroadcaster::detach).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkHandle(u64);

struct SinkEntry {
    queue: mpsc::Sender<QuoteEvent>,
    cancel: CancellationToken,
}

/// Fan-out hub over the live set of subscriber sinks.
///
/// `publish` may be called from the ingestion task while sinks attach and
/// detach concurrently; the registry is the only shared mutable state and
/// is lock-mediated.
pub struct QuoteBroadcaster {
    config: BroadcastConfig,
    next_id: AtomicU64,
    sinks: RwLock<HashMap<u64, SinkEntry>>,
    shutdown: CancellationToken,
}

impl QuoteBroadcaster {
    /// Create a hub. Cancelling `shutdown` winds down every delivery task.
    #[must_use]
    pub fn new(config: BroadcastConfig, shutdown: CancellationToken) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            sinks: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    /// Attach a sink and spawn its delivery task.
    ///
    /// The sink starts receiving events published after this call.
    pub fn attach(self: &Arc<Self>, sink: Arc<dyn QuoteSink>) -> SinkHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (queue, events) = mpsc::channel(self.config.sink_queue_capacity);
        let cancel = self.shutdown.child_token();

        {
            let mut sinks = self.sinks.write();
            sinks.insert(
                id,
                SinkEntry {
                    queue,
                    cancel: cancel.clone(),
                },
            );
            metrics::set_attached_sinks(sinks.len());
        }
        tracing::debug!(sink = id, "sink attached");

        let hub = Arc::clone(self);
        tokio::spawn(async move {
            hub.deliver_loop(id, sink, events, cancel).await;
        });

        SinkHandle(id)
    }

    /// Detach a sink.
    ///
    /// Events published after this call are never delivered to it; events
    /// already queued are discarded.
    pub fn detach(&self, handle: SinkHandle) {
        self.remove(handle.0);
    }

    /// Push one event to every attached sink.
    ///
    /// Never awaits. Returns the number of sinks the event was queued
    /// for. Sinks whose queue is full have exhausted their delivery
    /// budget and are detached.
    pub fn publish(&self, event: &QuoteEvent) -> usize {
        let mut queued = 0usize;
        let mut stalled: Vec<u64> = Vec::new();

        {
            let sinks = self.sinks.read();
            for (id, entry) in sinks.iter() {
                match entry.queue.try_send(event.clone()) {
                    Ok(()) => queued += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(sink = *id, "sink queue full; detaching stalled subscriber");
                        metrics::record_quote_dropped();
                        stalled.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => stalled.push(*id),
                }
            }
        }

        for id in stalled {
            self.remove(id);
        }
        queued
    }

    /// Number of currently attached sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    async fn deliver_loop(
        &self,
        id: u64,
        sink: Arc<dyn QuoteSink>,
        mut events: mpsc::Receiver<QuoteEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let outcome = tokio::select! {
                () = cancel.cancelled() => break,
                outcome = tokio::time::timeout(self.config.delivery_timeout, sink.deliver(event)) => outcome,
            };
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(sink = id, error = %e, "sink delivery failed; detaching");
                    break;
                }
                Err(_elapsed) => {
                    tracing::warn!(sink = id, "sink exceeded its delivery budget; detaching");
                    break;
                }
            }
        }
        self.remove(id);
    }

    fn remove(&self, id: u64) {
        let removed = {
            let mut sinks = self.sinks.write();
            let removed = sinks.remove(&id);
            if removed.is_some() {
                metrics::set_attached_sinks(sinks.len());
            }
            removed
        };
        if let Some(entry) = removed {
            entry.cancel.cancel();
            tracing::debug!(sink = id, "sink detached");
        }
    }
}

/// Shared fan-out hub reference.
pub type SharedBroadcaster = Arc<QuoteBroadcaster>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::{MockQuoteSink, SinkError};

    fn quote(symbol: &str) -> QuoteEvent {
        QuoteEvent {
            symbol: symbol.to_string(),
            price: Decimal::new(18996, 2),
            observed_at: Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap(),
        }
    }

    fn hub() -> Arc<QuoteBroadcaster> {
        Arc::new(QuoteBroadcaster::new(
            BroadcastConfig::default(),
            CancellationToken::new(),
        ))
    }

    /// Forwards deliveries into an unbounded channel for assertions.
    struct CollectorSink {
        tx: mpsc::UnboundedSender<QuoteEvent>,
    }

    #[async_trait]
    impl QuoteSink for CollectorSink {
        async fn deliver(&self, event: QuoteEvent) -> Result<(), SinkError> {
            self.tx
                .send(event)
                .map_err(|e| SinkError::Closed(e.to_string()))
        }
    }

    fn collector() -> (Arc<CollectorSink>, mpsc::UnboundedReceiver<QuoteEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(CollectorSink { tx }), rx)
    }

    #[tokio::test]
    async fn publish_queues_for_every_attached_sink() {
        let hub = hub();
        let (sink_a, mut rx_a) = collector();
        let (sink_b, mut rx_b) = collector();
        let _a = hub.attach(sink_a);
        let _b = hub.attach(sink_b);

        assert_eq!(hub.publish(&quote("AAPL")), 2);

        assert_eq!(rx_a.recv().await.unwrap().symbol, "AAPL");
        assert_eq!(rx_b.recv().await.unwrap().symbol, "AAPL");
    }

    #[tokio::test]
    async fn publish_with_no_sinks_queues_nothing() {
        let hub = hub();
        assert_eq!(hub.publish(&quote("AAPL")), 0);
        assert_eq!(hub.sink_count(), 0);
    }

    #[tokio::test]
    async fn detached_sink_is_skipped_by_later_publishes() {
        let hub = hub();
        let (sink, mut rx) = collector();
        let handle = hub.attach(sink);

        assert_eq!(hub.publish(&quote("AAPL")), 1);
        assert_eq!(rx.recv().await.unwrap().symbol, "AAPL");

        hub.detach(handle);
        assert_eq!(hub.publish(&quote("MSFT")), 0);
        assert_eq!(hub.sink_count(), 0);
    }

    #[tokio::test]
    async fn failing_sink_is_removed() {
        let hub = hub();
        let mut sink = MockQuoteSink::new();
        sink.expect_deliver()
            .returning(|_| Err(SinkError::Delivery("broken pipe".to_string())));
        let _handle = hub.attach(Arc::new(sink));
        assert_eq!(hub.sink_count(), 1);

        let _ = hub.publish(&quote("AAPL"));

        // The delivery task observes the failure and removes the sink.
        for _ in 0..50 {
            if hub.sink_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("failing sink was not detached");
    }

    #[tokio::test]
    async fn full_queue_detaches_the_stalled_sink() {
        let config = BroadcastConfig {
            sink_queue_capacity: 1,
            delivery_timeout: Duration::from_secs(60),
        };
        let hub = Arc::new(QuoteBroadcaster::new(config, CancellationToken::new()));

        struct StuckSink;
        #[async_trait]
        impl QuoteSink for StuckSink {
            async fn deliver(&self, _event: QuoteEvent) -> Result<(), SinkError> {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }

        let _handle = hub.attach(Arc::new(StuckSink));

        // First publish may hand the event straight to the delivery task;
        // filling the queue takes at most two more.
        let _ = hub.publish(&quote("AAPL"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = hub.publish(&quote("MSFT"));
        let queued = hub.publish(&quote("GOOG"));

        assert_eq!(queued, 0);
        assert_eq!(hub.sink_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_token_winds_down_delivery_tasks() {
        let shutdown = CancellationToken::new();
        let hub = Arc::new(QuoteBroadcaster::new(
            BroadcastConfig::default(),
            shutdown.clone(),
        ));
        let (sink, _rx) = collector();
        let _handle = hub.attach(sink);
        assert_eq!(hub.sink_count(), 1);

        shutdown.cancel();

        for _ in 0..50 {
            if hub.sink_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("delivery task did not stop on shutdown");
    }
}
