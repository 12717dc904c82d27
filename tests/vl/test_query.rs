// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query against the stub API, including reasoning and encoded-image reuse

use moondream_client::{CaptionOptions, ImageInput, QueryOptions, Vlm};

use crate::common::{test_image, StubServer, ANSWER, REASONING_TEXT};

#[tokio::test]
async fn test_query_without_reasoning() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let output = client
        .query(
            Some(ImageInput::from(&image)),
            "What's in the image?",
            QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(output.answer.as_complete(), Some(ANSWER));
    assert!(output.reasoning.is_none());

    let body = server.last_request().body;
    assert_eq!(body["question"], "What's in the image?");
    assert!(body.get("reasoning").is_none());
}

#[tokio::test]
async fn test_query_with_reasoning_grounding() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let options = QueryOptions {
        reasoning: true,
        ..Default::default()
    };
    let output = client
        .query(Some(ImageInput::from(&image)), "Which side is red?", options)
        .await
        .unwrap();

    let reasoning = output.reasoning.expect("reasoning should be present");
    assert_eq!(reasoning.text, REASONING_TEXT);
    assert_eq!(reasoning.grounding.len(), 2);
    assert_eq!(reasoning.grounding[0].start_idx, 4);
    assert_eq!(reasoning.grounding[1].points, vec![[0.95, 0.5], [0.9, 0.4]]);
    assert_eq!(server.last_request().body["reasoning"], true);
}

#[tokio::test]
async fn test_query_stream_matches_non_stream() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let complete = client
        .query(Some(ImageInput::from(&image)), "Describe it", QueryOptions::default())
        .await
        .unwrap()
        .answer
        .collect()
        .await
        .unwrap();

    let options = QueryOptions {
        stream: true,
        ..Default::default()
    };
    let streamed = client
        .query(Some(ImageInput::from(&image)), "Describe it", options)
        .await
        .unwrap();
    assert!(streamed.answer.is_streaming());
    assert!(streamed.reasoning.is_none());

    assert_eq!(streamed.answer.collect().await.unwrap(), complete);
    assert_eq!(server.last_request().body["stream"], true);
}

#[tokio::test]
async fn test_text_only_query_sends_no_image() {
    let server = StubServer::start().await;
    let client = server.client();

    client
        .query(None, "What is a gradient?", QueryOptions::default())
        .await
        .unwrap();

    let body = server.last_request().body;
    assert!(body.get("image_url").is_none());
    assert_eq!(body["question"], "What is a gradient?");
}

#[tokio::test]
async fn test_encoded_image_reused_across_calls() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let encoded = client.encode_image(ImageInput::from(&image)).await.unwrap();
    // Encoding an encoded image hands it back unchanged
    let again = client.encode_image(ImageInput::from(&encoded)).await.unwrap();
    assert_eq!(again, encoded);

    client
        .query(Some(ImageInput::from(&encoded)), "First?", QueryOptions::default())
        .await
        .unwrap();
    client
        .caption(ImageInput::from(&encoded), CaptionOptions::default())
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.body["image_url"], encoded.image_url());
    }
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let server = StubServer::start().await;
    let client = server.client();

    let err = client
        .query(None, "   ", QueryOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_local());
    assert!(server.requests().is_empty());
}
