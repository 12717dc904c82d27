// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segment against the stub API, streamed and not

use futures_util::{StreamExt, TryStreamExt};
use moondream_client::{
    ImageInput, SegmentOptions, SegmentResult, SegmentStreamChunk, SpatialRef, Vlm,
};

use crate::common::{test_image, StubServer, SEGMENT_PATH};

#[tokio::test]
async fn test_segment_complete_with_spatial_refs() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let options = SegmentOptions {
        spatial_refs: Some(vec![
            SpatialRef::Point([0.5, 0.5]),
            SpatialRef::BBox([0.1, 0.1, 0.9, 0.9]),
        ]),
        ..Default::default()
    };
    let result = client
        .segment(ImageInput::from(&image), "square", options)
        .await
        .unwrap();

    let SegmentResult::Complete(output) = result else {
        panic!("expected a complete result");
    };
    assert_eq!(output.path, SEGMENT_PATH);
    assert!(output.bbox.is_some());

    let body = server.last_request().body;
    assert_eq!(
        body["spatial_refs"],
        serde_json::json!([[0.5, 0.5], [0.1, 0.1, 0.9, 0.9]])
    );
    assert_eq!(body["stream"], false);
}

#[tokio::test]
async fn test_segment_without_refs_omits_field() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let options = SegmentOptions {
        spatial_refs: Some(Vec::new()),
        ..Default::default()
    };
    client
        .segment(ImageInput::from(&image), "square", options)
        .await
        .unwrap();

    assert!(server.last_request().body.get("spatial_refs").is_none());
}

#[tokio::test]
async fn test_segment_stream_ordering() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let options = SegmentOptions {
        stream: true,
        ..Default::default()
    };
    let result = client
        .segment(ImageInput::from(&image), "square", options)
        .await
        .unwrap();
    let SegmentResult::Streaming(updates) = result else {
        panic!("expected a stream");
    };

    let updates: Vec<SegmentStreamChunk> = updates.try_collect().await.unwrap();
    assert_eq!(updates.len(), 4);

    let first = &updates[0];
    assert!(first.bbox.is_some());
    assert!(first.completed.is_none());

    let coarse: String = updates[1..3]
        .iter()
        .map(|u| u.chunk.clone().unwrap())
        .collect();
    assert_eq!(coarse, "M 0.1 0.1 L 0.9 0.1 L 0.9 0.9 L 0.1 0.9");

    let last = updates.last().unwrap();
    assert!(last.is_final());
    assert_eq!(last.path.as_deref(), Some(SEGMENT_PATH));
    assert!(last.bbox.is_some());
    assert_eq!(updates.iter().filter(|u| u.is_final()).count(), 1);
}

#[tokio::test]
async fn test_segment_stream_into_output_matches_complete() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let complete = client
        .segment(ImageInput::from(&image), "square", SegmentOptions::default())
        .await
        .unwrap()
        .into_output()
        .await
        .unwrap();

    let options = SegmentOptions {
        stream: true,
        ..Default::default()
    };
    let streamed = client
        .segment(ImageInput::from(&image), "square", options)
        .await
        .unwrap()
        .into_output()
        .await
        .unwrap();

    assert_eq!(streamed, complete);
}

#[tokio::test]
async fn test_abandoned_stream_does_not_block_next_call() {
    let server = StubServer::start().await;
    let client = server.client();
    let image = test_image();

    let options = SegmentOptions {
        stream: true,
        ..Default::default()
    };
    let result = client
        .segment(ImageInput::from(&image), "square", options)
        .await
        .unwrap();
    if let SegmentResult::Streaming(mut updates) = result {
        let first = updates.next().await.unwrap().unwrap();
        assert!(first.bbox.is_some());
        // Dropped here without reading the rest
    }

    let next = client
        .segment(ImageInput::from(&image), "square", SegmentOptions::default())
        .await
        .unwrap();
    assert!(matches!(next, SegmentResult::Complete(_)));
    assert_eq!(server.requests().len(), 2);
}
