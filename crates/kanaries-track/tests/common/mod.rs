// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use kanaries_track::{Config, RawEvent};
use serde_json::json;
use std::time::Duration;

pub const TOKEN: &str = "integration-token";

/// Configuration pointing at a mock ingestion server, with fast retries.
pub fn mock_config(host: String) -> Config {
    Config {
        host,
        auth_token: TOKEN.to_string(),
        max_retries: 3,
        retry_base_delay: Duration::from_millis(1),
        timeout: Duration::from_secs(2),
        upload_interval: Duration::from_millis(50),
        ..Default::default()
    }
}

pub fn page_view(n: i64) -> RawEvent {
    let mut event = RawEvent::new();
    event.insert("event".to_string(), json!("page_view"));
    event.insert("n".to_string(), json!(n));
    event
}
