// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server-sent-event decoding for streamed responses
//!
//! Streaming endpoints answer with `data: <json>` blocks separated by a blank
//! line. The response body is pulled only as fast as the caller polls the
//! returned stream, and dropping the stream drops the body, which releases
//! the connection.

use std::pin::Pin;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::error::{MoondreamError, Result};
use crate::types::{Region, SegmentStream, SegmentStreamChunk, TextStream};

/// Raw response body
pub(crate) type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Accumulates body bytes and splits them into SSE blocks
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    pending: Vec<u8>,
    /// Bytes of `pending` already searched for a block separator
    scanned: usize,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append body bytes; carriage returns are dropped so CRLF framing
    /// behaves like LF
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Next complete non-empty block, if one is buffered
    ///
    /// Bytes are only decoded once a whole block is available, so multi-byte
    /// characters split across network chunks survive.
    pub fn next_block(&mut self) -> Option<Result<String>> {
        loop {
            // Back up one byte so a separator split across chunks is found
            let start = self.scanned.saturating_sub(1);
            let Some(offset) = self.pending[start..].windows(2).position(|w| w == b"\n\n") else {
                self.scanned = self.pending.len();
                return None;
            };
            let pos = start + offset;
            let block: Vec<u8> = self.pending.drain(..pos + 2).take(pos).collect();
            self.scanned = 0;
            match String::from_utf8(block) {
                Ok(block) if block.trim().is_empty() => continue,
                Ok(block) => return Some(Ok(block)),
                Err(e) => {
                    return Some(Err(MoondreamError::Decode(format!(
                        "stream event is not valid UTF-8: {}",
                        e
                    ))))
                }
            }
        }
    }

    /// Take whatever is left once the body has ended
    pub fn take_remaining(&mut self) -> Option<Result<String>> {
        let rest = std::mem::take(&mut self.pending);
        self.scanned = 0;
        match String::from_utf8(rest) {
            Ok(rest) if rest.trim().is_empty() => None,
            Ok(rest) => Some(Ok(rest)),
            Err(e) => Some(Err(MoondreamError::Decode(format!(
                "stream event is not valid UTF-8: {}",
                e
            )))),
        }
    }
}

/// Split an SSE block into its event name and joined data lines
pub(crate) fn parse_sse_block(block: &str) -> (Option<&str>, String) {
    let mut event_name = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_name = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }

    (event_name, data_lines.join("\n"))
}

/// Pulls SSE data payloads out of a response body
struct EventReader {
    body: ByteStream,
    buffer: SseBuffer,
    body_done: bool,
}

impl EventReader {
    fn new(body: ByteStream) -> Self {
        Self {
            body,
            buffer: SseBuffer::new(),
            body_done: false,
        }
    }

    async fn next_data(&mut self) -> Option<Result<String>> {
        loop {
            let block = if self.body_done {
                self.buffer.take_remaining()
            } else {
                self.buffer.next_block()
            };

            match block {
                Some(Ok(block)) => {
                    let (event, data) = parse_sse_block(&block);
                    if data.is_empty() {
                        debug!("Skipping SSE block without data (event={:?})", event);
                        continue;
                    }
                    return Some(Ok(data));
                }
                Some(Err(e)) => return Some(Err(e)),
                None if self.body_done => return None,
                None => {}
            }

            match self.body.next().await {
                Some(Ok(bytes)) => self.buffer.push_chunk(&bytes),
                Some(Err(e)) => return Some(Err(MoondreamError::Http(e))),
                None => self.body_done = true,
            }
        }
    }
}

/// What to do with one decoded event
enum Step<T> {
    /// Yield and keep reading
    Emit(T),
    /// Yield and end the stream
    Last(T),
    /// End the stream without yielding
    Done,
    Skip,
}

type EventStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

fn decode_events<T, F>(body: ByteStream, on_event: F) -> EventStream<T>
where
    T: Send + 'static,
    F: FnMut(&str) -> Result<Step<T>> + Send + 'static,
{
    let state = Some((EventReader::new(body), on_event));
    Box::pin(stream::unfold(state, |state| async move {
        let Some((mut reader, mut on_event)) = state else {
            return None;
        };
        loop {
            let data = match reader.next_data().await {
                Some(Ok(data)) => data,
                Some(Err(e)) => return Some((Err(e), None)),
                None => {
                    return Some((
                        Err(MoondreamError::Decode(
                            "stream ended before the completion event".to_string(),
                        )),
                        None,
                    ))
                }
            };

            match on_event(&data) {
                Ok(Step::Emit(item)) => return Some((Ok(item), Some((reader, on_event)))),
                Ok(Step::Last(item)) => return Some((Ok(item), None)),
                Ok(Step::Done) => return None,
                Ok(Step::Skip) => continue,
                Err(e) => return Some((Err(e), None)),
            }
        }
    }))
}

#[derive(Debug, Deserialize)]
struct TextEvent {
    #[serde(default)]
    chunk: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

fn on_text_event(data: &str) -> Result<Step<String>> {
    let event: TextEvent = serde_json::from_str(data)
        .map_err(|e| MoondreamError::Decode(format!("malformed stream event: {}", e)))?;

    if let Some(message) = event.error {
        return Err(MoondreamError::Server(message));
    }

    let chunk = event.chunk.filter(|c| !c.is_empty());
    Ok(match (chunk, event.completed.unwrap_or(false)) {
        (Some(chunk), true) => Step::Last(chunk),
        (None, true) => Step::Done,
        (Some(chunk), false) => Step::Emit(chunk),
        (None, false) => Step::Skip,
    })
}

/// Stream of text fragments for caption and query
pub(crate) fn text_stream(body: ByteStream) -> TextStream {
    decode_events(body, on_text_event)
}

#[derive(Debug, Deserialize)]
struct SegmentEvent {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    bbox: Option<Region>,
    #[serde(default)]
    chunk: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn on_segment_event(data: &str) -> Result<Step<SegmentStreamChunk>> {
    let event: SegmentEvent = serde_json::from_str(data)
        .map_err(|e| MoondreamError::Decode(format!("malformed segment event: {}", e)))?;

    if let Some(message) = event.error {
        return Err(MoondreamError::Server(message));
    }

    match event.kind.as_deref() {
        Some("bbox") => {
            let bbox = event.bbox.ok_or_else(|| {
                MoondreamError::Decode("bbox segment event has no bbox".to_string())
            })?;
            Ok(Step::Emit(SegmentStreamChunk {
                bbox: Some(bbox),
                ..Default::default()
            }))
        }
        Some("path_delta") => {
            let chunk = event.chunk.ok_or_else(|| {
                MoondreamError::Decode("path_delta segment event has no chunk".to_string())
            })?;
            Ok(Step::Emit(SegmentStreamChunk {
                chunk: Some(chunk),
                ..Default::default()
            }))
        }
        Some("final") => {
            let path = event.path.filter(|p| !p.is_empty()).ok_or_else(|| {
                MoondreamError::Decode("final segment event has no path".to_string())
            })?;
            Ok(Step::Last(SegmentStreamChunk {
                bbox: event.bbox,
                path: Some(path),
                completed: Some(true),
                ..Default::default()
            }))
        }
        other => {
            debug!("Skipping unknown segment event type {:?}", other);
            Ok(Step::Skip)
        }
    }
}

/// Stream of segmentation updates
pub(crate) fn segment_stream(body: ByteStream) -> SegmentStream {
    decode_events(body, on_segment_event)
}
