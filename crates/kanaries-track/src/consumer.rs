// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch consumers draining the event queue.
//!
//! Each consumer runs as one task on the client's runtime:
//!
//! ```text
//!   loop until cancelled:
//!     open window (upload_interval)
//!     ├── dequeue_wait(remaining window) ──> append
//!     ├── batch reaches upload_size      ──> close
//!     ├── window elapsed / wait timeout  ──> close
//!     └── cancellation                   ──> close
//!     non-empty batch ──> Delivery::deliver (outcome recorded, batch discarded)
//!
//!   on cancellation:
//!     drain the queue in upload_size chunks, delivering each
//!     first failed delivery ──> discard the rest of the queue, exit
//! ```
//!
//! Cancellation interrupts a queue wait immediately but never an in-flight
//! delivery: a batch that started sending finishes, retries included. Once a
//! drain delivery fails, the remaining events are counted as dropped at
//! shutdown instead of paying a full retry cycle each.

use crate::event::EnrichedEvent;
use crate::queue::EventQueue;
use crate::stats::PipelineStats;
use crate::transport::{Delivery, DeliveryOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct Consumer {
    id: usize,
    queue: Arc<EventQueue>,
    delivery: Arc<dyn Delivery>,
    stats: Arc<PipelineStats>,
    upload_size: usize,
    upload_interval: Duration,
    cancel_token: CancellationToken,
}

impl Consumer {
    #[must_use]
    pub fn new(
        id: usize,
        queue: Arc<EventQueue>,
        delivery: Arc<dyn Delivery>,
        stats: Arc<PipelineStats>,
        upload_size: usize,
        upload_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Consumer {
            id,
            queue,
            delivery,
            stats,
            upload_size: upload_size.max(1),
            upload_interval,
            cancel_token,
        }
    }

    /// Collects and delivers batches until cancelled, then drains the queue.
    pub async fn run(self) {
        debug!("Consumer {} started", self.id);

        while !self.cancel_token.is_cancelled() {
            let batch = self.collect_batch().await;
            if !batch.is_empty() {
                self.upload(batch).await;
            }
        }

        debug!("Consumer {} shutting down, draining queue", self.id);
        loop {
            let batch = self.queue.drain_batch(self.upload_size);
            if batch.is_empty() {
                break;
            }
            if !self.upload(batch).await.is_delivered() {
                let discarded = self.queue.drain_batch(usize::MAX).len();
                if discarded > 0 {
                    self.stats.record_dropped_at_shutdown(discarded);
                    warn!(
                        "Consumer {} failed to deliver while draining, dropping {} queued events",
                        self.id, discarded
                    );
                }
                break;
            }
        }
        debug!("Consumer {} stopped", self.id);
    }

    /// Fills one batch, closing it on size, window expiry or cancellation.
    async fn collect_batch(&self) -> Vec<EnrichedEvent> {
        let start = Instant::now();
        let mut batch = Vec::new();

        while batch.len() < self.upload_size {
            let remaining = self.upload_interval.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }

            let next = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => break,
                next = self.queue.dequeue_wait(remaining) => next,
            };

            match next {
                Some(event) => batch.push(event),
                None => break,
            }
        }

        batch
    }

    async fn upload(&self, batch: Vec<EnrichedEvent>) -> DeliveryOutcome {
        let batch_len = batch.len();
        debug!("Consumer {} uploading {} events", self.id, batch_len);
        let outcome = self.delivery.deliver(batch).await;
        self.stats.record_delivery(batch_len, outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{enrich, RawEvent};
    use crate::transport::testing::{FailingDelivery, RecordingDelivery};
    use serde_json::json;

    fn event(n: i64) -> EnrichedEvent {
        let mut raw = RawEvent::new();
        raw.insert("n".to_string(), json!(n));
        enrich(raw)
    }

    struct Harness {
        queue: Arc<EventQueue>,
        delivery: Arc<RecordingDelivery>,
        stats: Arc<PipelineStats>,
        cancel_token: CancellationToken,
    }

    impl Harness {
        fn new(capacity: usize) -> Self {
            Harness {
                queue: Arc::new(EventQueue::new(capacity)),
                delivery: Arc::new(RecordingDelivery::default()),
                stats: Arc::new(PipelineStats::default()),
                cancel_token: CancellationToken::new(),
            }
        }

        fn consumer(&self, upload_size: usize, upload_interval: Duration) -> Consumer {
            let delivery = Arc::clone(&self.delivery) as Arc<dyn Delivery>;
            self.consumer_with(delivery, upload_size, upload_interval)
        }

        fn consumer_with(
            &self,
            delivery: Arc<dyn Delivery>,
            upload_size: usize,
            upload_interval: Duration,
        ) -> Consumer {
            Consumer::new(
                0,
                Arc::clone(&self.queue),
                delivery,
                Arc::clone(&self.stats),
                upload_size,
                upload_interval,
                self.cancel_token.clone(),
            )
        }

        fn fill(&self, n: i64) {
            for i in 0..n {
                assert!(self.queue.try_enqueue(event(i)));
            }
        }
    }

    #[tokio::test]
    async fn test_batch_closes_at_upload_size() {
        let harness = Harness::new(100);
        harness.fill(7);
        let consumer = harness.consumer(3, Duration::from_secs(10));

        let start = std::time::Instant::now();
        let batch = consumer.collect_batch().await;

        assert_eq!(batch.len(), 3);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(harness.queue.len(), 4);
    }

    #[tokio::test]
    async fn test_batch_closes_when_window_elapses() {
        let harness = Harness::new(100);
        harness.fill(2);
        let consumer = harness.consumer(100, Duration::from_millis(100));

        let start = std::time::Instant::now();
        let batch = consumer.collect_batch().await;

        assert_eq!(batch.len(), 2);
        assert!(start.elapsed() >= Duration::from_millis(90));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_wait() {
        let harness = Harness::new(100);
        let consumer = harness.consumer(100, Duration::from_secs(30));

        let token = harness.cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let start = std::time::Instant::now();
        let batch = consumer.collect_batch().await;

        assert!(batch.is_empty());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_delivers_in_order_and_records_stats() {
        let harness = Harness::new(100);
        harness.fill(5);
        let handle = tokio::spawn(harness.consumer(2, Duration::from_millis(50)).run());

        tokio::time::sleep(Duration::from_millis(300)).await;
        harness.cancel_token.cancel();
        handle.await.expect("consumer panicked");

        let batches = harness.delivery.ns();
        assert!(batches.iter().all(|b| b.len() <= 2));
        let flat: Vec<i64> = batches.into_iter().flatten().collect();
        assert_eq!(flat, vec![0, 1, 2, 3, 4]);

        let stats = harness.stats.snapshot();
        assert_eq!(stats.events_delivered, 5);
        assert_eq!(stats.batches_failed, 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_remaining_events() {
        let harness = Harness::new(1000);
        let consumer = harness.consumer(10, Duration::from_mins(1));
        harness.cancel_token.cancel();
        harness.fill(25);

        let start = std::time::Instant::now();
        consumer.run().await;

        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(harness.queue.is_empty());
        assert_eq!(harness.delivery.total(), 25);
        let sizes: Vec<usize> = harness.delivery.ns().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_window_closes_under_continuous_arrivals() {
        let harness = Harness::new(10_000);
        let consumer = harness.consumer(10_000, Duration::from_millis(100));

        let stop = CancellationToken::new();
        let producer = {
            let queue = Arc::clone(&harness.queue);
            let stop = stop.clone();
            tokio::spawn(async move {
                let mut n = 0;
                while !stop.is_cancelled() {
                    let _ = queue.try_enqueue(event(n));
                    n += 1;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };

        let start = std::time::Instant::now();
        let batch = consumer.collect_batch().await;
        let elapsed = start.elapsed();
        stop.cancel();
        producer.await.expect("producer panicked");

        assert!(!batch.is_empty());
        assert!(elapsed >= Duration::from_millis(90));
        assert!(elapsed < Duration::from_millis(500), "window ran {elapsed:?}");
    }

    #[tokio::test]
    async fn test_failed_drain_delivery_discards_rest_of_queue() {
        let harness = Harness::new(100);
        let delivery = Arc::new(FailingDelivery::default());
        let consumer = harness.consumer_with(
            Arc::clone(&delivery) as Arc<dyn Delivery>,
            1,
            Duration::from_mins(1),
        );
        harness.cancel_token.cancel();
        harness.fill(20);

        let start = std::time::Instant::now();
        consumer.run().await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(delivery.calls(), 1);
        assert!(harness.queue.is_empty());
        let stats = harness.stats.snapshot();
        assert_eq!(stats.events_failed, 1);
        assert_eq!(stats.dropped_after_shutdown, 19);
    }
}
