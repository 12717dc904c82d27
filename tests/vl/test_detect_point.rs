// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect and point against the stub API

use moondream_client::{ImageInput, MoondreamError, Vlm};

use crate::common::{test_image, StubServer, GARBAGE_OBJECT};

#[tokio::test]
async fn test_detect_returns_regions() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let output = client
        .detect(ImageInput::from(&image), "face", None)
        .await
        .unwrap();

    assert_eq!(output.objects.len(), 2);
    let first = output.objects[0];
    assert!((first.x_min - 0.1).abs() < 1e-9);
    assert!((first.y_max - 0.6).abs() < 1e-9);

    let request = server.last_request();
    assert_eq!(request.path, "/detect");
    assert_eq!(request.body["object"], "face");
    assert!(request.body.get("variant").is_none());
}

#[tokio::test]
async fn test_point_returns_points_with_variant() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let output = client
        .point(
            ImageInput::from(&image),
            "person",
            Some("moondream3-preview".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(output.points.len(), 2);
    assert!((output.points[1].x - 0.65).abs() < 1e-9);

    let request = server.last_request();
    assert_eq!(request.path, "/point");
    assert_eq!(request.body["object"], "person");
    assert_eq!(request.body["variant"], "moondream3-preview");
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let err = client
        .detect(ImageInput::from(&image), GARBAGE_OBJECT, None)
        .await
        .unwrap_err();

    match err {
        MoondreamError::Decode(message) => assert!(message.contains("detect")),
        other => panic!("expected Decode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_object_rejected_before_sending() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let err = client
        .point(ImageInput::from(&image), "", None)
        .await
        .unwrap_err();

    assert!(matches!(err, MoondreamError::InvalidRequest(_)));
    assert!(server.requests().is_empty());
}
