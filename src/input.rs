// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image inputs and their wire encoding
//!
//! Raw images are sent as `data:image/jpeg;base64,...` URLs. An
//! [`EncodedImage`] can be produced once and reused for several calls in the
//! same process; its format is tied to the server version and must not be
//! persisted.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

use crate::error::{MoondreamError, Result};

/// JPEG quality used for uploads
pub const JPEG_QUALITY: u8 = 95;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Image preprocessed for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodedImage {
    Base64(Base64EncodedImage),
}

/// Image carried inline as a base64 data URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64EncodedImage {
    pub image_url: String,
}

impl EncodedImage {
    /// Value sent in the `image_url` request field
    pub fn image_url(&self) -> &str {
        match self {
            EncodedImage::Base64(b64) => &b64.image_url,
        }
    }
}

/// Image argument accepted by every operation
#[derive(Debug, Clone, Copy)]
pub enum ImageInput<'a> {
    Raw(&'a DynamicImage),
    Encoded(&'a EncodedImage),
}

impl<'a> From<&'a DynamicImage> for ImageInput<'a> {
    fn from(image: &'a DynamicImage) -> Self {
        ImageInput::Raw(image)
    }
}

impl<'a> From<&'a EncodedImage> for ImageInput<'a> {
    fn from(image: &'a EncodedImage) -> Self {
        ImageInput::Encoded(image)
    }
}

impl ImageInput<'_> {
    /// Encode raw images; already-encoded inputs are returned unchanged
    pub fn encode(&self) -> Result<EncodedImage> {
        match self {
            ImageInput::Raw(image) => encode_base64_jpeg(image),
            ImageInput::Encoded(encoded) => Ok((*encoded).clone()),
        }
    }

    /// Same as [`ImageInput::encode`], with the JPEG work moved onto the
    /// blocking thread pool so async workers are not stalled
    pub async fn encode_blocking(&self) -> Result<EncodedImage> {
        match self {
            ImageInput::Raw(image) => {
                let image = DynamicImage::clone(image);
                tokio::task::spawn_blocking(move || encode_base64_jpeg(&image))
                    .await
                    .map_err(|e| MoondreamError::EncodeTask(e.to_string()))?
            }
            ImageInput::Encoded(encoded) => Ok((*encoded).clone()),
        }
    }
}

/// JPEG-encode an image and wrap it in a base64 data URL
///
/// Alpha and extra channels are dropped; JPEG only carries RGB.
pub fn encode_base64_jpeg(image: &DynamicImage) -> Result<EncodedImage> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY))?;

    debug!(
        "Encoded {}x{} image as JPEG ({} bytes)",
        rgb.width(),
        rgb.height(),
        bytes.len()
    );

    let mut image_url = String::with_capacity(DATA_URL_PREFIX.len() + bytes.len() * 4 / 3 + 4);
    image_url.push_str(DATA_URL_PREFIX);
    STANDARD.encode_string(&bytes, &mut image_url);

    Ok(EncodedImage::Base64(Base64EncodedImage { image_url }))
}
