// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Moondream client

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Client identifier sent to the API
pub const CLIENT_NAME: &str = "moondream-rust";

/// Operations this client speaks
pub const FEATURES: &[&str] = &[
    "caption",
    "caption-stream",
    "query",
    "query-stream",
    "query-reasoning",
    "detect",
    "point",
    "segment",
    "segment-stream",
    "local-server",
];

/// Value of the `User-Agent` header
pub fn user_agent() -> String {
    format!("{}/{}", CLIENT_NAME, VERSION_NUMBER)
}

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Moondream client {}", VERSION_NUMBER)
}

/// Version details as JSON, for diagnostics output
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "client": CLIENT_NAME,
        "version": VERSION_NUMBER,
        "features": FEATURES,
    })
}
