// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Reads newline-delimited JSON objects from stdin and tracks each one.
//!
//! Configuration comes from `KANARIES_TRACK_*` environment variables. The
//! client is shut down at end of input so every queued event is delivered
//! before the process exits.

use kanaries_track::{logger, Client, Config, RawEvent};
use serde_json::Value;
use std::io::{self, BufRead};
use std::process::ExitCode;
use tracing::{error, info, warn};

pub fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            logger::init(false);
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logger::init(config.debug);

    let client = match Client::new(config) {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to start tracking client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    for (index, line) in stdin.lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(event)) => client.track(event),
            Ok(None) => {}
            Err(e) => warn!("Skipping line {}: {}", index + 1, e),
        }
    }

    client.shutdown();
    let stats = client.stats();
    info!(
        "Tracked {} events: {} delivered, {} failed, {} dropped",
        stats.tracked,
        stats.events_delivered,
        stats.events_failed,
        stats.dropped_queue_full + stats.dropped_after_shutdown
    );
    ExitCode::SUCCESS
}

/// Parses one input line. Blank lines yield `None`.
fn parse_line(line: &str) -> Result<Option<RawEvent>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(event)) => Ok(Some(event)),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}
