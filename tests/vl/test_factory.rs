// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Factory policy: cloud needs a key, local is pinned to loopback

use moondream_client::{
    vl, CaptionOptions, CloudVl, ImageInput, MoondreamError, VlConfig, Vlm, DEFAULT_API_URL,
    LOCAL_API_URL,
};

use crate::common::test_image;

#[test]
fn test_default_config_fails_without_key() {
    let err = vl(VlConfig::default()).unwrap_err();
    assert!(matches!(err, MoondreamError::Config(_)));
}

#[test]
fn test_custom_url_still_needs_key() {
    let config = VlConfig {
        api_url: Some("http://127.0.0.1:8000".to_string()),
        ..Default::default()
    };
    assert!(matches!(vl(config), Err(MoondreamError::Config(_))));
}

#[test]
fn test_cloud_defaults_to_hosted_url() {
    let client = vl(VlConfig::cloud("key")).unwrap();
    assert_eq!(client.api_url(), DEFAULT_API_URL);
    assert!(client.has_api_key());
}

#[test]
fn test_local_ignores_caller_url_and_key() {
    let config = VlConfig {
        api_key: Some("ignored".to_string()),
        api_url: Some("https://somewhere.example/v1".to_string()),
        local: true,
        timeout: None,
    };
    let client = vl(config).unwrap();
    assert_eq!(client.api_url(), LOCAL_API_URL);
    assert!(!client.has_api_key());

    let preset = CloudVl::local().unwrap();
    assert_eq!(preset.api_url(), client.api_url());
}

#[test]
fn test_client_is_shareable() {
    fn assert_send_sync<T: Send + Sync + Clone>() {}
    assert_send_sync::<CloudVl>();
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Grab a free port, then close it so the connection is refused
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = vl(VlConfig::cloud("key").with_api_url(format!("http://127.0.0.1:{}", port)))
        .unwrap();
    let image = test_image();
    let err = client
        .caption(ImageInput::from(&image), CaptionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, MoondreamError::Http(_)));
    assert!(!err.is_local());
}
