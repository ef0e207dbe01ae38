// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide client.
//!
//! Applications that do not want to thread a [`Client`] through their code
//! use the functions here. The instance is created on first use from
//! `KANARIES_TRACK_*` environment variables, or installed up front with
//! [`init`]. Call [`shutdown`] once before the process exits so queued events
//! are delivered.

use crate::client::Client;
use crate::config::Config;
use crate::error::TrackError;
use crate::event::RawEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

static CLIENT: Mutex<Option<Arc<Client>>> = Mutex::new(None);

fn slot() -> MutexGuard<'static, Option<Arc<Client>>> {
    CLIENT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Installs a client built from `config`, unless one already exists.
///
/// Returns the installed instance; when a client already exists `config` is
/// ignored and the existing one is returned.
pub fn init(config: Config) -> Result<Arc<Client>, TrackError> {
    let mut slot = slot();
    if let Some(client) = slot.as_ref() {
        debug!("Tracking client already initialized, ignoring new configuration");
        return Ok(Arc::clone(client));
    }
    let client = Arc::new(Client::new(config)?);
    *slot = Some(Arc::clone(&client));
    Ok(client)
}

/// Returns the process-wide client, building it from the environment on first use.
pub fn get_client() -> Result<Arc<Client>, TrackError> {
    let mut slot = slot();
    if let Some(client) = slot.as_ref() {
        return Ok(Arc::clone(client));
    }

    let config = Config::from_env()?;
    let client = Arc::new(Client::new(config)?);
    *slot = Some(Arc::clone(&client));
    Ok(client)
}

/// Tracks `event` on the process-wide client. A client that cannot be built
/// is logged and the event dropped.
pub fn track(event: RawEvent) {
    match get_client() {
        Ok(client) => client.track(event),
        Err(e) => error!("Unable to create tracking client, dropping event: {}", e),
    }
}

/// Shuts down and removes the process-wide client, draining its queue.
pub fn shutdown() {
    let client = slot().take();
    if let Some(client) = client {
        client.shutdown();
    }
}

/// Drops the process-wide client so the next call builds a fresh one.
#[doc(hidden)]
pub fn reset() {
    let client = slot().take();
    drop(client);
}
