// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Connection configuration for Moondream clients
//!
//! A single [`VlConfig`] describes both deployment modes:
//! - cloud: hosted API, requires an API key
//! - local: a same-host server on a fixed loopback address, no key

use std::env;
use std::time::Duration;

use crate::error::{MoondreamError, Result};

/// Hosted API base URL
pub const DEFAULT_API_URL: &str = "https://api.moondream.ai/v1";

/// Base URL of a locally running Moondream server
pub const LOCAL_API_URL: &str = "http://localhost:8000";

/// Configuration for constructing a Moondream client
#[derive(Clone, Default)]
pub struct VlConfig {
    /// API key for the cloud endpoint
    pub api_key: Option<String>,
    /// Base URL override; `None` means [`DEFAULT_API_URL`]
    pub api_url: Option<String>,
    /// Talk to the local server instead of the cloud
    pub local: bool,
    /// Whole-request timeout; `None` disables it
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for VlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VlConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("local", &self.local)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Connection settings after mode resolution and validation
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    /// Base URL without a trailing slash
    pub api_url: String,
    /// Credential sent as `X-Moondream-Auth`
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl VlConfig {
    /// Cloud configuration with the given API key
    pub fn cloud(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Local server configuration
    pub fn local() -> Self {
        Self {
            local: true,
            ..Self::default()
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Load configuration from environment variables
    ///
    /// Reads `MOONDREAM_API_KEY`, `MOONDREAM_API_URL`, `MOONDREAM_LOCAL` and
    /// `MOONDREAM_TIMEOUT_SECS`. Empty values count as unset.
    pub fn from_env() -> Result<Self> {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let local = match non_empty("MOONDREAM_LOCAL") {
            Some(v) => parse_flag(&v).ok_or_else(|| {
                MoondreamError::Config(format!(
                    "MOONDREAM_LOCAL must be true or false, got '{}'",
                    v
                ))
            })?,
            None => false,
        };

        let timeout = match non_empty("MOONDREAM_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = v.trim().parse().map_err(|_| {
                    MoondreamError::Config(format!(
                        "MOONDREAM_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        v
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            api_key: non_empty("MOONDREAM_API_KEY"),
            api_url: non_empty("MOONDREAM_API_URL"),
            local,
            timeout,
        })
    }

    /// Resolve the mode into concrete connection settings
    ///
    /// Local mode pins the URL to [`LOCAL_API_URL`] and drops any key. Cloud
    /// mode fails fast without a non-empty key.
    pub fn resolve(&self) -> Result<ResolvedConnection> {
        if self.timeout == Some(Duration::ZERO) {
            return Err(MoondreamError::Config(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if self.local {
            return Ok(ResolvedConnection {
                api_url: LOCAL_API_URL.to_string(),
                api_key: None,
                timeout: self.timeout,
            });
        }

        let api_key = match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                return Err(MoondreamError::Config(
                    "an API key is required in cloud mode (set local for a local server)"
                        .to_string(),
                ))
            }
        };

        let api_url = normalize_url(self.api_url.as_deref().unwrap_or(DEFAULT_API_URL))?;

        Ok(ResolvedConnection {
            api_url,
            api_key: Some(api_key),
            timeout: self.timeout,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| MoondreamError::Config(format!("invalid API URL '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(MoondreamError::Config(format!(
            "unsupported URL scheme '{}' in '{}'",
            other, raw
        ))),
    }
}
