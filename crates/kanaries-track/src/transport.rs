// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of batches to the ingestion endpoint.
//!
//! # Request
//!
//! ```text
//! POST <host>/ingest/track
//! Track-Key: <auth_token>
//! Content-Type: application/json
//!
//! [{"a": 1, "timestamp": "...", "message_id": "..."}, ...]
//! ```
//!
//! # Retry
//!
//! Network errors, timeouts and any non-2xx status count as a failed attempt.
//! Failed attempts are retried with exponential backoff until `max_retries`
//! attempts have been made, after which the batch is dropped. Delivery is
//! at-most-once: nothing is handed back to the queue.

use crate::config::Config;
use crate::constants::TRACK_KEY_HEADER;
use crate::error::{TrackError, TransportError};
use crate::event::EnrichedEvent;
use crate::http::build_client;
use crate::retry::{retry, RetryPolicy};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Instant;
use tracing::{debug, error, warn};

/// Result of handing one batch to a [`Delivery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    /// Every attempt failed, or the batch could not be encoded (`attempts == 0`)
    Dropped { attempts: u32 },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts } | Self::Dropped { attempts } => *attempts,
        }
    }

    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Destination for batches produced by the pipeline.
///
/// Implementations absorb their own failures; the returned outcome is
/// informational only.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, batch: Vec<EnrichedEvent>) -> DeliveryOutcome;
}

/// [`Delivery`] that POSTs batches to the track ingestion endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    retry_policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, TrackError> {
        let client = build_client(config)?;

        let mut headers = HeaderMap::new();
        let track_key = HeaderValue::from_str(&config.auth_token).map_err(|_| {
            TrackError::InvalidConfig("auth_token is not a valid header value".to_string())
        })?;
        headers.insert(TRACK_KEY_HEADER, track_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(HttpTransport {
            client,
            url: config.ingest_url(),
            headers,
            retry_policy: RetryPolicy::exponential(config.max_retries, config.retry_base_delay),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, body: Bytes) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            // Don't read response body unless needed
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TransportError::Status { status, body })
    }

    /// Serializes `batch` and POSTs it, retrying per the configured policy.
    ///
    /// Returns the number of attempts on success.
    pub async fn send(&self, batch: &[EnrichedEvent]) -> Result<u32, (u32, TransportError)> {
        let body = serde_json::to_vec(batch).map_err(|e| (0_u32, TransportError::from(e)))?;
        let body = Bytes::from(body);

        retry(&self.retry_policy, |_| self.post(body.clone()))
            .await
            .map(|((), attempts)| attempts)
            .map_err(|e| (e.attempts, e.last_error))
    }
}

#[async_trait]
impl Delivery for HttpTransport {
    async fn deliver(&self, batch: Vec<EnrichedEvent>) -> DeliveryOutcome {
        let n_events = batch.len();
        debug!("Sending {} events to {}", n_events, self.url);

        let time = Instant::now();
        match self.send(&batch).await {
            Ok(attempts) => {
                debug!(
                    "Delivered {} events in {} ms after {} attempt(s)",
                    n_events,
                    time.elapsed().as_millis(),
                    attempts
                );
                DeliveryOutcome::Delivered { attempts }
            }
            Err((0, e)) => {
                error!("Failed to prepare payload. {} events dropped: {}", n_events, e);
                DeliveryOutcome::Dropped { attempts: 0 }
            }
            Err((attempts, e)) => {
                warn!(
                    "Failed to send {} events after {} ms and {} attempts, dropping batch: {}",
                    n_events,
                    time.elapsed().as_millis(),
                    attempts,
                    e
                );
                DeliveryOutcome::Dropped { attempts }
            }
        }
    }
}
