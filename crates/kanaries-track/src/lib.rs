// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Kanaries Track
//!
//! Client-side telemetry emitter for the Kanaries track ingestion endpoint.
//!
//! ## Overview
//!
//! Applications call [`Client::track`] (or the process-wide [`track`]) with a
//! JSON object. Each event is stamped with a timestamp and a message id,
//! buffered in a bounded queue, grouped into batches by background consumers
//! and POSTed to `<host>/ingest/track` with exponential-backoff retries.
//! Telemetry is best-effort: a full queue or an unreachable endpoint drops
//! events, counts them, and never surfaces an error to the caller.
//!
//! ## Modules
//!
//! - [`event`]: raw and enriched events, [`enrich`](event::enrich)
//! - [`queue`]: bounded FIFO shared by producers and consumers
//! - [`consumer`]: batch collection and delivery loop
//! - [`transport`]: the [`Delivery`] seam and its HTTP implementation
//! - [`retry`]: retrying-call helper with exponential backoff
//! - [`client`]: the pipeline orchestrator
//! - [`global`]: lazily built process-wide client
//!
//! ## Example
//!
//! ```rust,no_run
//! use kanaries_track::{Client, Config, RawEvent};
//! use serde_json::json;
//!
//! let client = Client::new(Config {
//!     auth_token: "my-token".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let mut event = RawEvent::new();
//! event.insert("event".to_string(), json!("page_view"));
//! client.track(event);
//!
//! client.shutdown();
//! # Ok::<(), kanaries_track::TrackError>(())
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_copy_implementations)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod event;
pub mod global;
pub mod http;
pub mod logger;
pub mod queue;
pub mod retry;
pub mod stats;
pub mod transport;

pub use client::Client;
pub use config::{Config, ProxyConfig};
pub use error::{TrackError, TransportError};
pub use event::{EnrichedEvent, RawEvent};
pub use global::{get_client, init, shutdown, track};
pub use stats::StatsSnapshot;
pub use transport::{Delivery, DeliveryOutcome, HttpTransport};
