// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction.
//!
//! The client is built once per [`Config`] and shared by every consumer, so all
//! deliveries reuse the same connection pool. It carries:
//! - the per-request timeout
//! - TLS verification (disabled only when `verify` is false)
//! - optional HTTP and HTTPS proxies
//! - pooled connections with TCP keep-alive
//!
//! Unlike the rest of the pipeline, a bad proxy URL here is a hard error: the
//! client refuses to start rather than silently sending without the proxy.

use crate::config::Config;
use crate::constants::{POOL_IDLE_TIMEOUT, TCP_KEEPALIVE};
use crate::error::TrackError;
use tracing::{debug, warn};

/// Builds the shared `reqwest::Client` for ingestion requests.
pub fn build_client(config: &Config) -> Result<reqwest::Client, TrackError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
        .tcp_keepalive(Some(TCP_KEEPALIVE));

    if !config.verify {
        warn!("TLS certificate verification is disabled for ingestion requests");
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(http_proxy) = &config.proxies.http {
        let proxy = reqwest::Proxy::http(http_proxy)
            .map_err(|e| TrackError::InvalidConfig(format!("invalid http proxy: {e}")))?;
        builder = builder.proxy(proxy);
    }
    if let Some(https_proxy) = &config.proxies.https {
        let proxy = reqwest::Proxy::https(https_proxy)
            .map_err(|e| TrackError::InvalidConfig(format!("invalid https proxy: {e}")))?;
        builder = builder.proxy(proxy);
    }

    if config.proxies.is_empty() {
        // Only explicitly configured proxies apply
        builder = builder.no_proxy();
    } else {
        debug!("Using proxies {:?}", config.proxies);
    }

    builder
        .build()
        .map_err(|e| TrackError::HttpClient(e.to_string()))
}
