// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the Moondream client
//!
//! Every fallible operation in the crate returns [`MoondreamError`]. Variants
//! separate problems the caller can fix before sending (`Config`,
//! `InvalidRequest`) from failures reported by the network or the server.

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, MoondreamError>;

/// Errors that can occur while talking to a Moondream endpoint
#[derive(Debug, Error)]
pub enum MoondreamError {
    /// Client configuration is unusable (missing API key in cloud mode, bad URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network failure or timeout from the HTTP transport
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// Response body could not be parsed
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Server reported an error in the middle of a stream
    #[error("Server error: {0}")]
    Server(String),

    /// Request rejected locally before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Image could not be encoded for transmission
    #[error("Failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    /// Background encoding task panicked or was cancelled
    #[error("Image encoding task failed: {0}")]
    EncodeTask(String),
}

impl MoondreamError {
    /// True for errors raised before any network traffic happened
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            MoondreamError::Config(_)
                | MoondreamError::InvalidRequest(_)
                | MoondreamError::Image(_)
                | MoondreamError::EncodeTask(_)
        )
    }
}

impl From<serde_json::Error> for MoondreamError {
    fn from(err: serde_json::Error) -> Self {
        MoondreamError::Decode(err.to_string())
    }
}
