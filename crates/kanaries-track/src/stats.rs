// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pipeline counters.
//!
//! Every dropped event is counted here so sustained telemetry loss is visible
//! to the host application through [`crate::client::Client::stats`].

use crate::transport::DeliveryOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    tracked: AtomicU64,
    enqueued: AtomicU64,
    dropped_queue_full: AtomicU64,
    dropped_after_shutdown: AtomicU64,
    batches_delivered: AtomicU64,
    events_delivered: AtomicU64,
    batches_failed: AtomicU64,
    events_failed: AtomicU64,
    delivery_attempts: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub tracked: u64,
    pub enqueued: u64,
    pub dropped_queue_full: u64,
    pub dropped_after_shutdown: u64,
    pub batches_delivered: u64,
    pub events_delivered: u64,
    pub batches_failed: u64,
    pub events_failed: u64,
    pub delivery_attempts: u64,
}

impl PipelineStats {
    pub(crate) fn record_tracked(&self) {
        self.tracked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_full(&self) {
        self.dropped_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_after_shutdown(&self) {
        self.dropped_after_shutdown.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_at_shutdown(&self, events: usize) {
        self.dropped_after_shutdown
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self, batch_len: usize, outcome: DeliveryOutcome) {
        let events = batch_len as u64;
        self.delivery_attempts
            .fetch_add(u64::from(outcome.attempts()), Ordering::Relaxed);
        match outcome {
            DeliveryOutcome::Delivered { .. } => {
                self.batches_delivered.fetch_add(1, Ordering::Relaxed);
                self.events_delivered.fetch_add(events, Ordering::Relaxed);
            }
            DeliveryOutcome::Dropped { .. } => {
                self.batches_failed.fetch_add(1, Ordering::Relaxed);
                self.events_failed.fetch_add(events, Ordering::Relaxed);
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tracked: self.tracked.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            dropped_after_shutdown: self.dropped_after_shutdown.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            delivery_attempts: self.delivery_attempts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_delivery_outcomes() {
        let stats = PipelineStats::default();
        stats.record_delivery(3, DeliveryOutcome::Delivered { attempts: 2 });
        stats.record_delivery(5, DeliveryOutcome::Dropped { attempts: 4 });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.batches_delivered, 1);
        assert_eq!(snapshot.events_delivered, 3);
        assert_eq!(snapshot.batches_failed, 1);
        assert_eq!(snapshot.events_failed, 5);
        assert_eq!(snapshot.delivery_attempts, 6);
    }

    #[test]
    fn test_drop_counters_are_separate() {
        let stats = PipelineStats::default();
        stats.record_queue_full();
        stats.record_queue_full();
        stats.record_after_shutdown();
        stats.record_dropped_at_shutdown(4);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dropped_queue_full, 2);
        assert_eq!(snapshot.dropped_after_shutdown, 5);
        assert_eq!(snapshot.tracked, 0);
    }
}
