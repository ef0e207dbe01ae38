// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO shared by `track` callers and batch consumers.
//!
//! This is the single point of backpressure in the pipeline. Producers never
//! wait: when the queue is at capacity the incoming event is dropped and
//! counted, and everything already queued stays in place. Consumers wait for
//! events with a timeout so that a batch window can always close.
//!
//! ```text
//!   track() ──try_enqueue──> [ e1 | e2 | ... | eN ] ──dequeue_wait──> consumers
//!                  │ full
//!                  └──> dropped += 1
//! ```

use crate::event::EnrichedEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug)]
pub struct EventQueue {
    items: Mutex<VecDeque<EnrichedEvent>>,
    capacity: usize,
    available: Notify,
    dropped: AtomicU64,
}

impl EventQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        EventQueue {
            // Pre-allocate modestly; large capacities grow on demand
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            available: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<EnrichedEvent>> {
        // No code path panics while holding the lock, so the data is never left half-updated
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `event` unless the queue is full. Never waits.
    ///
    /// Returns `false` when the event was dropped.
    #[must_use]
    pub fn try_enqueue(&self, event: EnrichedEvent) -> bool {
        {
            let mut items = self.items();
            if items.len() >= self.capacity {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            items.push_back(event);
        }
        self.available.notify_one();
        true
    }

    pub fn try_dequeue(&self) -> Option<EnrichedEvent> {
        self.items().pop_front()
    }

    /// Waits up to `timeout` for the oldest event.
    ///
    /// Returns `None` once the timeout elapses with nothing queued. Dropping the
    /// returned future before it resolves never loses an event.
    pub async fn dequeue_wait(&self, timeout: Duration) -> Option<EnrichedEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register interest before checking so an enqueue between the check
            // and the await still wakes us
            notified.as_mut().enable();

            if let Some(event) = self.try_dequeue() {
                return Some(event);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_dequeue();
            }
        }
    }

    /// Removes up to `max` events without waiting.
    pub fn drain_batch(&self, max: usize) -> Vec<EnrichedEvent> {
        let mut items = self.items();
        let n = max.min(items.len());
        items.drain(..n).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events rejected because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<EnrichedEvent> {
        self.items().iter().cloned().collect()
    }
}
