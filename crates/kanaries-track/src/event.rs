// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Event types and enrichment.
//!
//! A [`RawEvent`] is whatever the caller hands to `track`. Before it enters the
//! pipeline it is stamped with an enrichment-time timestamp and a fresh message
//! id, producing an [`EnrichedEvent`] that serializes as a single flat JSON
//! object:
//!
//! ```text
//! {"event": "click", "user": 7, "timestamp": "2024-05-01T10:00:00.123456+02:00", "message_id": "…"}
//! ```

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Caller-supplied event. No schema is enforced.
pub type RawEvent = Map<String, Value>;

pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const MESSAGE_ID_FIELD: &str = "message_id";

/// A raw event plus the metadata added by [`enrich`].
///
/// Immutable once created; fields are only readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    fields: RawEvent,
    timestamp: String,
    message_id: String,
}

impl EnrichedEvent {
    /// Caller fields, without the enrichment metadata.
    #[must_use]
    pub fn fields(&self) -> &RawEvent {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// RFC 3339 timestamp with the local UTC offset.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

/// Stamps `event` with the current local time and a random UUID v4.
///
/// Caller keys named `timestamp` or `message_id` are replaced.
#[must_use]
pub fn enrich(mut event: RawEvent) -> EnrichedEvent {
    event.remove(TIMESTAMP_FIELD);
    event.remove(MESSAGE_ID_FIELD);

    EnrichedEvent {
        fields: event,
        timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        message_id: Uuid::new_v4().to_string(),
    }
}
