// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request options and response shapes for the Moondream API
//!
//! Wire field names match the JSON the endpoints exchange. Optional fields
//! are skipped when serializing and default to `None` when absent.

use std::fmt;
use std::pin::Pin;

use futures::{Stream, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{MoondreamError, Result};

/// Lazy, single-use sequence of text fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Lazy, single-use sequence of segmentation updates
pub type SegmentStream = Pin<Box<dyn Stream<Item = Result<SegmentStreamChunk>> + Send>>;

/// Generation settings; unset fields use server defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl SamplingSettings {
    pub fn max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_tokens == Some(0) {
            return Err(MoondreamError::InvalidRequest(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Requested caption length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionLength {
    Short,
    #[default]
    Normal,
    Long,
}

impl CaptionLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionLength::Short => "short",
            CaptionLength::Normal => "normal",
            CaptionLength::Long => "long",
        }
    }
}

impl std::str::FromStr for CaptionLength {
    type Err = MoondreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(CaptionLength::Short),
            "normal" => Ok(CaptionLength::Normal),
            "long" => Ok(CaptionLength::Long),
            other => Err(MoondreamError::InvalidRequest(format!(
                "unknown caption length '{}'; expected short, normal or long",
                other
            ))),
        }
    }
}

/// Options for [`crate::Vlm::caption`]
#[derive(Debug, Clone, Default)]
pub struct CaptionOptions {
    pub length: CaptionLength,
    pub stream: bool,
    pub settings: Option<SamplingSettings>,
    pub variant: Option<String>,
}

/// Options for [`crate::Vlm::query`]
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub stream: bool,
    pub settings: Option<SamplingSettings>,
    /// Ask the model to return grounded reasoning with the answer
    pub reasoning: bool,
    pub variant: Option<String>,
}

/// Options for [`crate::Vlm::segment`]
#[derive(Debug, Clone, Default)]
pub struct SegmentOptions {
    pub spatial_refs: Option<Vec<SpatialRef>>,
    pub stream: bool,
    pub settings: Option<SamplingSettings>,
}

/// Generated text, either complete or still arriving
pub enum TextOutput {
    Complete(String),
    Streaming(TextStream),
}

impl TextOutput {
    pub fn is_streaming(&self) -> bool {
        matches!(self, TextOutput::Streaming(_))
    }

    /// Complete text, if this output was not streamed
    pub fn as_complete(&self) -> Option<&str> {
        match self {
            TextOutput::Complete(text) => Some(text),
            TextOutput::Streaming(_) => None,
        }
    }

    /// Materialize the text, draining the stream if there is one
    pub async fn collect(self) -> Result<String> {
        match self {
            TextOutput::Complete(text) => Ok(text),
            TextOutput::Streaming(stream) => {
                stream
                    .try_fold(String::new(), |mut acc, fragment| async move {
                        acc.push_str(&fragment);
                        Ok(acc)
                    })
                    .await
            }
        }
    }
}

impl fmt::Debug for TextOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextOutput::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            TextOutput::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Result of a caption call
#[derive(Debug)]
pub struct CaptionOutput {
    pub caption: TextOutput,
}

/// A span of the reasoning text tied to image locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningGrounding {
    pub start_idx: usize,
    pub end_idx: usize,
    /// Normalized `[x, y]` pairs supporting the span
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub text: String,
    #[serde(default)]
    pub grounding: Vec<ReasoningGrounding>,
}

/// Result of a query call; `reasoning` is only present when requested
#[derive(Debug)]
pub struct QueryOutput {
    pub answer: TextOutput,
    pub reasoning: Option<Reasoning>,
}

/// Normalized bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Region {
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.x_min + self.x_max) / 2.0,
            y: (self.y_min + self.y_max) / 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectOutput {
    pub objects: Vec<Region>,
}

/// Normalized image coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOutput {
    pub points: Vec<Point>,
}

/// Spatial hint for segmentation, sent as a bare JSON array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpatialRef {
    /// `[x, y]`
    Point([f64; 2]),
    /// `[x_min, y_min, x_max, y_max]`
    BBox([f64; 4]),
}

impl SpatialRef {
    fn values(&self) -> &[f64] {
        match self {
            SpatialRef::Point(p) => p,
            SpatialRef::BBox(b) => b,
        }
    }

    /// Check that every coordinate is normalized to `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        if let Some(v) = self
            .values()
            .iter()
            .find(|v| !v.is_finite() || **v < 0.0 || **v > 1.0)
        {
            return Err(MoondreamError::InvalidRequest(format!(
                "spatial ref values must be within [0, 1], got {}",
                v
            )));
        }
        if let SpatialRef::BBox([x_min, y_min, x_max, y_max]) = self {
            if x_min > x_max || y_min > y_max {
                return Err(MoondreamError::InvalidRequest(
                    "spatial ref bbox has min greater than max".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl TryFrom<&[f64]> for SpatialRef {
    type Error = MoondreamError;

    fn try_from(values: &[f64]) -> Result<Self> {
        match values {
            [x, y] => Ok(SpatialRef::Point([*x, *y])),
            [x_min, y_min, x_max, y_max] => {
                Ok(SpatialRef::BBox([*x_min, *y_min, *x_max, *y_max]))
            }
            _ => Err(MoondreamError::InvalidRequest(format!(
                "spatial ref needs 2 (point) or 4 (bbox) values, got {}",
                values.len()
            ))),
        }
    }
}

impl From<Point> for SpatialRef {
    fn from(p: Point) -> Self {
        SpatialRef::Point([p.x, p.y])
    }
}

impl From<Region> for SpatialRef {
    fn from(r: Region) -> Self {
        SpatialRef::BBox([r.x_min, r.y_min, r.x_max, r.y_max])
    }
}

/// Completed segmentation: an SVG path plus its bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOutput {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Region>,
}

/// Incremental segmentation update
///
/// The first update carries `bbox`, middle updates carry `chunk` (coarse
/// path text), and the last carries `path`, `bbox` and `completed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentStreamChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl SegmentStreamChunk {
    pub fn is_final(&self) -> bool {
        self.completed == Some(true)
    }
}

/// Result of a segment call
pub enum SegmentResult {
    Complete(SegmentOutput),
    Streaming(SegmentStream),
}

impl SegmentResult {
    /// Materialize the final segmentation, draining the stream if there is one
    pub async fn into_output(self) -> Result<SegmentOutput> {
        let mut stream = match self {
            SegmentResult::Complete(output) => return Ok(output),
            SegmentResult::Streaming(stream) => stream,
        };
        while let Some(update) = stream.try_next().await? {
            if update.is_final() {
                let path = update.path.ok_or_else(|| {
                    MoondreamError::Decode("final segment update has no path".to_string())
                })?;
                return Ok(SegmentOutput {
                    path,
                    bbox: update.bbox,
                });
            }
        }
        Err(MoondreamError::Decode(
            "segment stream ended without a final update".to_string(),
        ))
    }
}

impl fmt::Debug for SegmentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentResult::Complete(output) => f.debug_tuple("Complete").field(output).finish(),
            SegmentResult::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}
