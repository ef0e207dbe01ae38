// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pipeline orchestrator.
//!
//! A [`Client`] owns every moving part of the pipeline:
//!
//! ```text
//!   track(event)
//!       │ enrich
//!       v
//!   ┌─────────────┐  send == false ──> discarded
//!   │   Client    │  sync_send      ──> Delivery::deliver on the caller's thread
//!   └──────┬──────┘
//!          │ try_enqueue (full ──> dropped)
//!          v
//!   ┌─────────────┐
//!   │ EventQueue  │ bounded FIFO
//!   └──────┬──────┘
//!          │ dequeue_wait
//!          v
//!   ┌─────────────┐
//!   │ Consumer xN │ tasks on the client's own runtime
//!   └──────┬──────┘
//!          v
//!   ┌─────────────┐
//!   │  Delivery   │ HttpTransport (POST + retry)
//!   └─────────────┘
//! ```
//!
//! # Shutdown
//!
//! [`Client::shutdown`] cancels the consumers and waits for each one to drain
//! the queue. A consumer stops draining after its first failed delivery, so
//! an unreachable endpoint costs at most one retry cycle per consumer. Events
//! still queued once the consumers have exited are discarded and counted as
//! `dropped_after_shutdown`, as are events tracked afterwards in async mode.
//!
//! A config with `debug` set installs the crate's logger on construction.
//! Dropping the client runs the same shutdown and then releases the runtime
//! without blocking.

use crate::config::Config;
use crate::consumer::Consumer;
use crate::error::TrackError;
use crate::event::{enrich, EnrichedEvent, RawEvent};
use crate::logger;
use crate::queue::EventQueue;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::transport::{Delivery, HttpTransport};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const WORKER_THREAD_NAME: &str = "kanaries-track-worker";

pub struct Client {
    config: Arc<Config>,
    queue: Arc<EventQueue>,
    delivery: Arc<dyn Delivery>,
    stats: Arc<PipelineStats>,
    runtime: Option<Runtime>,
    cancel_token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Client {
    /// Builds a client delivering to the configured ingestion endpoint.
    pub fn new(config: Config) -> Result<Self, TrackError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::build(config, Arc::new(transport), true)
    }

    /// Builds a client around any [`Delivery`] implementation.
    pub fn with_delivery(config: Config, delivery: Arc<dyn Delivery>) -> Result<Self, TrackError> {
        config.validate()?;
        Self::build(config, delivery, true)
    }

    fn build(
        config: Config,
        delivery: Arc<dyn Delivery>,
        start_consumers: bool,
    ) -> Result<Self, TrackError> {
        if config.debug {
            logger::init(true);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.thread_count)
            .thread_name(WORKER_THREAD_NAME)
            .enable_all()
            .build()
            .map_err(|e| {
                error!("Failed to start runtime: {}", e);
                TrackError::Runtime(e.to_string())
            })?;

        let client = Client {
            queue: Arc::new(EventQueue::new(config.max_queue_size)),
            config: Arc::new(config),
            delivery,
            stats: Arc::new(PipelineStats::default()),
            runtime: Some(runtime),
            cancel_token: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        };

        if start_consumers && client.config.send && !client.config.sync_send {
            client.start_consumers();
        }

        debug!(
            "Tracking client ready: host={} send={} sync_send={} consumers={}",
            client.config.host,
            client.config.send,
            client.config.sync_send,
            client.config.thread_count
        );
        Ok(client)
    }

    fn start_consumers(&self) {
        let Some(runtime) = &self.runtime else {
            return;
        };
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for id in 0..self.config.thread_count {
            let consumer = Consumer::new(
                id,
                Arc::clone(&self.queue),
                Arc::clone(&self.delivery),
                Arc::clone(&self.stats),
                self.config.upload_size,
                self.config.upload_interval,
                self.cancel_token.clone(),
            );
            workers.push(runtime.spawn(consumer.run()));
        }
    }

    /// Records one event. Never fails and never panics.
    ///
    /// In the default async mode this only enriches and enqueues the event.
    /// In synchronous mode the caller waits for delivery, retries included.
    pub fn track(&self, event: RawEvent) {
        self.stats.record_tracked();
        let event = enrich(event);

        if !self.config.send {
            debug!("Sending disabled, discarding event {}", event.message_id());
            return;
        }

        if self.config.sync_send {
            self.deliver_now(event);
            return;
        }

        if self.closed.load(Ordering::Acquire) {
            self.stats.record_after_shutdown();
            debug!("Client is shut down, dropping event {}", event.message_id());
            return;
        }

        if self.queue.try_enqueue(event) {
            self.stats.record_enqueued();
        } else {
            self.stats.record_queue_full();
            warn!(
                queue_size = self.queue.capacity(),
                "Event queue is full, dropping event"
            );
        }
    }

    /// Tracks any value that serializes to a JSON object.
    ///
    /// Other values are logged and dropped.
    pub fn track_serialize<T: Serialize + ?Sized>(&self, event: &T) {
        match serde_json::to_value(event) {
            Ok(Value::Object(fields)) => self.track(fields),
            Ok(other) => warn!(
                "Dropping event: expected a JSON object, got {}",
                json_kind(&other)
            ),
            Err(e) => warn!("Dropping event that failed to serialize: {}", e),
        }
    }

    fn deliver_now(&self, event: EnrichedEvent) {
        let delivery = Arc::clone(&self.delivery);
        if let Some(outcome) = self.block_on(async move { delivery.deliver(vec![event]).await }) {
            self.stats.record_delivery(1, outcome);
        } else {
            warn!("Runtime unavailable, dropping event");
        }
    }

    /// Runs `future` to completion on the client's runtime from synchronous code.
    ///
    /// `Runtime::block_on` refuses to run on a thread that is already driving a
    /// runtime, so in that case the future is driven from a scoped helper thread.
    fn block_on<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let runtime = self.runtime.as_ref()?;
        if Handle::try_current().is_err() {
            return Some(runtime.block_on(future));
        }
        std::thread::scope(|scope| scope.spawn(|| runtime.block_on(future)).join().ok())
    }

    /// Stops the consumers after they drain the queue. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Shutting down tracking client");
        self.cancel_token.cancel();

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if !workers.is_empty() {
            let joined = self.block_on(async move {
                for worker in workers {
                    if let Err(e) = worker.await {
                        warn!("Consumer task failed: {}", e);
                    }
                }
            });
            if joined.is_none() {
                warn!("Could not wait for consumers to drain the queue");
            }
        }

        // Leftovers: consumers never started, or one stopped draining early
        let leftover = self.queue.drain_batch(usize::MAX).len();
        if leftover > 0 {
            self.stats.record_dropped_at_shutdown(leftover);
            warn!("Dropping {} events left in the queue at shutdown", leftover);
        }

        let stats = self.stats.snapshot();
        debug!(
            "Tracking client stopped: delivered={} failed={} dropped_queue_full={}",
            stats.events_delivered, stats.events_failed, stats.dropped_queue_full
        );
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
