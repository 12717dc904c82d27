// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Capability set shared by all Moondream backends

use async_trait::async_trait;

use crate::error::Result;
use crate::input::{EncodedImage, ImageInput};
use crate::types::{
    CaptionOptions, CaptionOutput, DetectOutput, PointOutput, QueryOptions, QueryOutput,
    SegmentOptions, SegmentResult,
};

/// Operations a visual-language model backend provides
///
/// Every operation accepts either a raw image or an [`EncodedImage`] from an
/// earlier [`Vlm::encode_image`] call. With `stream` set, text and
/// segmentation results come back as lazy streams that must be consumed (or
/// dropped) to release the underlying connection.
#[async_trait]
pub trait Vlm: Send + Sync {
    /// Preprocess an image once so it can be reused across calls
    ///
    /// The result is not stable across server versions and should not be
    /// persisted.
    async fn encode_image(&self, image: ImageInput<'_>) -> Result<EncodedImage>;

    /// Generate a caption for the image
    async fn caption(
        &self,
        image: ImageInput<'_>,
        options: CaptionOptions,
    ) -> Result<CaptionOutput>;

    /// Answer a question, optionally about an image
    async fn query(
        &self,
        image: Option<ImageInput<'_>>,
        question: &str,
        options: QueryOptions,
    ) -> Result<QueryOutput>;

    /// Bounding boxes for every instance of `object`
    async fn detect(
        &self,
        image: ImageInput<'_>,
        object: &str,
        variant: Option<String>,
    ) -> Result<DetectOutput>;

    /// Center points for every instance of `object`
    async fn point(
        &self,
        image: ImageInput<'_>,
        object: &str,
        variant: Option<String>,
    ) -> Result<PointOutput>;

    /// SVG path outlining `object`
    async fn segment(
        &self,
        image: ImageInput<'_>,
        object: &str,
        options: SegmentOptions,
    ) -> Result<SegmentResult>;
}
