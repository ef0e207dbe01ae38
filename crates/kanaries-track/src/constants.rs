// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire constants and configuration defaults.

use std::time::Duration;

/// Path of the ingestion endpoint, appended to the configured host.
pub const INGEST_TRACK_PATH: &str = "/ingest/track";

/// `Track-Key` header carrying the auth token on every ingestion request.
/// Header names are case-insensitive; `http` requires the lowercase form.
pub const TRACK_KEY_HEADER: &str = "track-key";

pub const DEFAULT_HOST: &str = "https://log.kanaries.net";
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 20 * 1000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_THREAD_COUNT: usize = 1;
pub const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_UPLOAD_SIZE: usize = 100;

/// Idle connections are kept slightly below the usual 300s load balancer timeout.
pub(crate) const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(270);
pub(crate) const TCP_KEEPALIVE: Duration = Duration::from_mins(2);
