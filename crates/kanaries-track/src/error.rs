// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while building a client. Nothing after construction
/// returns one of these to the caller of `track`.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// A single failed POST to the ingestion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),
}
