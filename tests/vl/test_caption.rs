// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption against the stub API, streamed and not

use futures_util::StreamExt;
use moondream_client::{
    CaptionLength, CaptionOptions, ImageInput, MoondreamError, SamplingSettings, TextOutput, Vlm,
};

use crate::common::{
    test_image, StubServer, NORMAL_CAPTION, REJECTED_API_KEY, SHORT_CAPTION, STUB_API_KEY,
};

#[tokio::test]
async fn test_caption_returns_complete_text() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let output = client
        .caption(ImageInput::from(&image), CaptionOptions::default())
        .await
        .unwrap();

    assert!(!output.caption.is_streaming());
    assert_eq!(output.caption.as_complete(), Some(NORMAL_CAPTION));

    let request = server.last_request();
    assert_eq!(request.path, "/caption");
    assert_eq!(request.auth.as_deref(), Some(STUB_API_KEY));
    assert!(request
        .user_agent
        .as_deref()
        .unwrap()
        .starts_with("moondream-rust/"));
    assert_eq!(request.body["length"], "normal");
    assert_eq!(request.body["stream"], false);
    assert!(request.body["image_url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
    assert!(request.body.get("settings").is_none());
    assert!(request.body.get("variant").is_none());
}

#[tokio::test]
async fn test_short_caption_stream_matches_non_stream() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let options = CaptionOptions {
        length: CaptionLength::Short,
        ..Default::default()
    };
    let complete = client
        .caption(ImageInput::from(&image), options.clone())
        .await
        .unwrap()
        .caption
        .collect()
        .await
        .unwrap();
    assert_eq!(complete, SHORT_CAPTION);

    let streamed = client
        .caption(
            ImageInput::from(&image),
            CaptionOptions {
                stream: true,
                ..options
            },
        )
        .await
        .unwrap();
    assert!(streamed.caption.is_streaming());

    let TextOutput::Streaming(mut fragments) = streamed.caption else {
        panic!("expected a stream");
    };
    let mut joined = String::new();
    let mut count = 0;
    while let Some(fragment) = fragments.next().await {
        joined.push_str(&fragment.unwrap());
        count += 1;
    }

    assert_eq!(joined, complete);
    assert_eq!(count, SHORT_CAPTION.split(' ').count());
    // Exhausted streams stay exhausted
    assert!(fragments.next().await.is_none());
}

#[tokio::test]
async fn test_caption_forwards_settings_and_variant() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let options = CaptionOptions {
        length: CaptionLength::Long,
        stream: false,
        settings: Some(SamplingSettings::max_tokens(128)),
        variant: Some("moondream3-preview".to_string()),
    };
    client
        .caption(ImageInput::from(&image), options)
        .await
        .unwrap();

    let body = server.last_request().body;
    assert_eq!(body["length"], "long");
    assert_eq!(body["settings"]["max_tokens"], 128);
    assert_eq!(body["variant"], "moondream3-preview");
}

#[tokio::test]
async fn test_caption_rejected_key_is_api_error() {
    let server = StubServer::start().await;
    let client = server.client_with_key(REJECTED_API_KEY);
    let image = test_image();

    let err = client
        .caption(ImageInput::from(&image), CaptionOptions::default())
        .await
        .unwrap_err();

    match err {
        MoondreamError::Api { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("invalid API key"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_caption_zero_max_tokens_not_sent() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let options = CaptionOptions {
        settings: Some(SamplingSettings::max_tokens(0)),
        ..Default::default()
    };
    let err = client
        .caption(ImageInput::from(&image), options)
        .await
        .unwrap_err();

    assert!(matches!(err, MoondreamError::InvalidRequest(_)));
    assert!(server.requests().is_empty());
}
