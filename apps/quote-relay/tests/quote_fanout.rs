//! Fan-out integration tests.
//!
//! Covers delivery to multiple sinks, detach semantics, per-sink
//! ordering, and isolation of stalled subscribers from healthy ones.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use quote_relay::{BroadcastConfig, QuoteBroadcaster, QuoteEvent, QuoteSink, SinkError};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Sink that forwards deliveries into a channel for assertions.
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

/// Sink that never completes a delivery.
struct StuckSink;

#[async_trait]
impl QuoteSink for StuckSink {
    async fn deliver(&self, _event: QuoteEvent) -> Result<(), SinkError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

fn collector() -> (Arc<CollectorSink>, mpsc::UnboundedReceiver<QuoteEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(CollectorSink { tx }), rx)
}

fn quote(symbol: &str, cents: i64) -> QuoteEvent {
    QuoteEvent {
        symbol: symbol.to_string(),
        price: Decimal::new(cents, 2),
        observed_at: Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap(),
    }
}

fn default_hub() -> Arc<QuoteBroadcaster> {
    Arc::new(QuoteBroadcaster::new(
        BroadcastConfig::default(),
        CancellationToken::new(),
    ))
}

#[tokio::test]
async fn publish_reaches_every_attached_sink() {
    let hub = default_hub();
    let (sink_a, mut rx_a) = collector();
    let (sink_b, mut rx_b) = collector();
    let (sink_c, mut rx_c) = collector();
    let _a = hub.attach(sink_a);
    let _b = hub.attach(sink_b);
    let _c = hub.attach(sink_c);

    let event = quote("AAPL", 18996);
    assert_eq!(hub.publish(&event), 3);

    for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
        let received = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivery within bound")
            .expect("channel open");
        assert_eq!(received, event);
    }
}

#[tokio::test]
async fn sink_detached_before_publish_never_sees_the_event() {
    let hub = default_hub();
    let (sink_a, mut rx_a) = collector();
    let (sink_b, mut rx_b) = collector();
    let _a = hub.attach(sink_a);
    let handle_b = hub.attach(sink_b);

    assert_eq!(hub.publish(&quote("AAPL", 18996)), 2);
    let _ = timeout(Duration::from_secs(1), rx_b.recv()).await.unwrap();

    hub.detach(handle_b);
    assert_eq!(hub.publish(&quote("MSFT", 37740)), 1);

    let received = timeout(Duration::from_secs(1), rx_a.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.symbol, "MSFT");

    // The detached sink's channel yields nothing more.
    let late = timeout(Duration::from_millis(200), rx_b.recv()).await;
    assert!(matches!(late, Err(_) | Ok(None)));
}

#[tokio::test]
async fn per_sink_delivery_order_matches_publish_order() {
    let hub = default_hub();
    let (sink, mut rx) = collector();
    let _handle = hub.attach(sink);

    for cents in 1..=20 {
        assert_eq!(hub.publish(&quote("AAPL", cents)), 1);
    }

    for cents in 1..=20 {
        let received = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.price, Decimal::new(cents, 2));
    }
}

#[tokio::test]
async fn stalled_sink_is_detached_without_delaying_healthy_sinks() {
    let hub = Arc::new(QuoteBroadcaster::new(
        BroadcastConfig {
            sink_queue_capacity: 4,
            delivery_timeout: Duration::from_millis(200),
        },
        CancellationToken::new(),
    ));

    let (sink_a, mut rx_a) = collector();
    let (sink_b, mut rx_b) = collector();
    let _stuck = hub.attach(Arc::new(StuckSink));
    let _a = hub.attach(sink_a);
    let _b = hub.attach(sink_b);
    assert_eq!(hub.sink_count(), 3);

    // Healthy sinks must see every event promptly while the stalled one
    // burns through its queue and delivery budget.
    for cents in 1..=10 {
        let _ = hub.publish(&quote("AAPL", cents));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for rx in [&mut rx_a, &mut rx_b] {
        for cents in 1..=10 {
            let received = timeout(Duration::from_millis(500), rx.recv())
                .await
                .expect("healthy sink delivery within bound")
                .expect("channel open");
            assert_eq!(received.price, Decimal::new(cents, 2));
        }
    }

    // The stalled sink is removed once its budget runs out.
    for _ in 0..50 {
        if hub.sink_count() == 2 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("stalled sink was not detached");
}

#[tokio::test]
async fn late_attachers_receive_only_prospective_events() {
    let hub = default_hub();
    let (sink_a, mut rx_a) = collector();
    let _a = hub.attach(sink_a);

    assert_eq!(hub.publish(&quote("AAPL", 100)), 1);
    let _ = timeout(Duration::from_secs(1), rx_a.recv()).await.unwrap();

    let (sink_b, mut rx_b) = collector();
    let _b = hub.attach(sink_b);

    assert_eq!(hub.publish(&quote("AAPL", 200)), 2);

    // The late attacher sees only the second event.
    let received = timeout(Duration::from_secs(1), rx_b.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.price, Decimal::new(200, 2));
}
