// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client SDK for the Moondream vision-language model API
//!
//! Captioning, visual question answering, object detection, pointing and
//! segmentation against the hosted API or a locally running server.
//!
//! ```no_run
//! use moondream_client::{vl, CaptionOptions, ImageInput, Vlm, VlConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = vl(VlConfig::cloud("your-api-key"))?;
//! let image = image::open("photo.jpg")?;
//! let output = client
//!     .caption(ImageInput::from(&image), CaptionOptions::default())
//!     .await?;
//! println!("{}", output.caption.collect().await?);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod cloud;
pub mod config;
pub mod error;
pub mod input;
mod streaming;
pub mod types;
pub mod version;
pub mod vlm;

pub use cloud::CloudVl;
pub use config::{VlConfig, DEFAULT_API_URL, LOCAL_API_URL};
pub use error::{MoondreamError, Result};
pub use input::{Base64EncodedImage, EncodedImage, ImageInput};
pub use types::{
    CaptionLength, CaptionOptions, CaptionOutput, DetectOutput, Point, PointOutput, QueryOptions,
    QueryOutput, Reasoning, ReasoningGrounding, Region, SamplingSettings, SegmentOptions,
    SegmentOutput, SegmentResult, SegmentStream, SegmentStreamChunk, SpatialRef, TextOutput,
    TextStream,
};
pub use vlm::Vlm;

/// Create a Moondream client
///
/// `VlConfig::default()` selects cloud mode, which requires an API key: a
/// missing key fails here with [`MoondreamError::Config`] before any network
/// call. With `local` set, the client targets [`LOCAL_API_URL`] and ignores
/// any URL or key in the config.
pub fn vl(config: VlConfig) -> Result<CloudVl> {
    CloudVl::new(config)
}
