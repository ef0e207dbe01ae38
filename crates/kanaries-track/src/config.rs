// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_HOST, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY,
    DEFAULT_THREAD_COUNT, DEFAULT_TIMEOUT, DEFAULT_UPLOAD_INTERVAL, DEFAULT_UPLOAD_SIZE,
};
use crate::error::TrackError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "KANARIES_TRACK_";

/// Proxies applied to ingestion requests, keyed by the scheme of the target URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }
}

/// Immutable snapshot of the client tunables. Read once when a client is built.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    /// Ingestion host, e.g. `https://log.kanaries.net`
    pub host: String,
    /// Sent as the `Track-Key` header
    pub auth_token: String,
    /// Lowers the default log level to debug when logging is initialized by this crate
    pub debug: bool,
    /// When false, events are enriched and discarded
    pub send: bool,
    /// Deliver on the caller's thread instead of through the queue
    pub sync_send: bool,
    pub max_queue_size: usize,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total attempts per batch, including the first one
    pub max_retries: u32,
    /// Wait after the first failed attempt; doubles on each further failure
    pub retry_base_delay: Duration,
    pub proxies: ProxyConfig,
    /// Number of batch consumers
    pub thread_count: usize,
    /// Verify the endpoint's TLS certificate
    pub verify: bool,
    /// Longest time a consumer keeps a batch open
    pub upload_interval: Duration,
    /// Largest number of events in one batch
    pub upload_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            auth_token: String::new(),
            debug: false,
            send: true,
            sync_send: false,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            proxies: ProxyConfig::default(),
            thread_count: DEFAULT_THREAD_COUNT,
            verify: true,
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
            upload_size: DEFAULT_UPLOAD_SIZE,
        }
    }
}

impl Config {
    /// Create configuration from `KANARIES_TRACK_*` environment variables.
    ///
    /// Unset variables keep their default. A variable that is set but cannot be
    /// parsed is an error rather than a silent fallback.
    pub fn from_env() -> Result<Self, TrackError> {
        let defaults = Self::default();

        let config = Self {
            host: env_string("HOST").unwrap_or(defaults.host),
            auth_token: env_string("AUTH_TOKEN").unwrap_or(defaults.auth_token),
            debug: env_bool("DEBUG")?.unwrap_or(defaults.debug),
            send: env_bool("SEND")?.unwrap_or(defaults.send),
            sync_send: env_bool("SYNC_SEND")?.unwrap_or(defaults.sync_send),
            max_queue_size: env_parse("MAX_QUEUE_SIZE")?.unwrap_or(defaults.max_queue_size),
            timeout: env_parse("TIMEOUT_SECS")?.map_or(defaults.timeout, Duration::from_secs),
            max_retries: env_parse("MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_base_delay: env_parse("RETRY_BASE_DELAY_MS")?
                .map_or(defaults.retry_base_delay, Duration::from_millis),
            proxies: ProxyConfig {
                http: env_string("HTTP_PROXY"),
                https: env_string("HTTPS_PROXY"),
            },
            thread_count: env_parse("THREAD")?.unwrap_or(defaults.thread_count),
            verify: env_bool("VERIFY")?.unwrap_or(defaults.verify),
            upload_interval: env_parse("UPLOAD_INTERVAL_MS")?
                .map_or(defaults.upload_interval, Duration::from_millis),
            upload_size: env_parse("UPLOAD_SIZE")?.unwrap_or(defaults.upload_size),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TrackError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(TrackError::InvalidConfig(
                "host must not be empty".to_string(),
            ));
        }
        let url = reqwest::Url::parse(host)
            .map_err(|e| TrackError::InvalidConfig(format!("invalid host '{host}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TrackError::InvalidConfig(format!(
                "host '{host}' must use http or https"
            )));
        }

        if self.max_queue_size == 0 {
            return Err(TrackError::InvalidConfig(
                "max_queue_size must be greater than 0".to_string(),
            ));
        }
        if self.upload_size == 0 {
            return Err(TrackError::InvalidConfig(
                "upload_size must be greater than 0".to_string(),
            ));
        }
        if self.thread_count == 0 {
            return Err(TrackError::InvalidConfig(
                "thread_count must be greater than 0".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(TrackError::InvalidConfig(
                "max_retries must be greater than 0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(TrackError::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if self.upload_interval.is_zero() {
            return Err(TrackError::InvalidConfig(
                "upload_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Full URL of the ingestion endpoint.
    #[must_use]
    pub fn ingest_url(&self) -> String {
        format!(
            "{}{}",
            self.host.trim().trim_end_matches('/'),
            crate::constants::INGEST_TRACK_PATH
        )
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|val| !val.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, TrackError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(name)
        .map(|val| {
            val.trim().parse::<T>().map_err(|e| {
                TrackError::InvalidConfig(format!("{ENV_PREFIX}{name}='{val}': {e}"))
            })
        })
        .transpose()
}

fn env_bool(name: &str) -> Result<Option<bool>, TrackError> {
    env_string(name)
        .map(|val| match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(TrackError::InvalidConfig(format!(
                "{ENV_PREFIX}{name}='{val}' is not a boolean"
            ))),
        })
        .transpose()
}
