// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP backend for the hosted Moondream API and local Moondream servers
//!
//! Both deployments share one wire protocol: each operation is a JSON `POST`
//! to `<api_url>/<operation>`. They differ only in base URL and credential,
//! so a single [`CloudVl`] type covers both; see [`CloudVl::local`].

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{VlConfig, LOCAL_API_URL};
use crate::error::{MoondreamError, Result};
use crate::input::{EncodedImage, ImageInput};
use crate::streaming::{segment_stream, text_stream, ByteStream};
use crate::types::{
    CaptionLength, CaptionOptions, CaptionOutput, DetectOutput, PointOutput, QueryOptions,
    QueryOutput, Reasoning, SamplingSettings, SegmentOptions, SegmentOutput, SegmentResult,
    SpatialRef, TextOutput,
};
use crate::version;
use crate::vlm::Vlm;

/// Header carrying the API key
pub const AUTH_HEADER: &str = "X-Moondream-Auth";

// --- Wire request bodies ---

#[derive(Debug, Serialize)]
struct CaptionRequest<'a> {
    image_url: &'a str,
    length: CaptionLength,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<SamplingSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    question: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<SamplingSettings>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    reasoning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'a str>,
}

/// Body shared by detect and point
#[derive(Debug, Serialize)]
struct ObjectRequest<'a> {
    image_url: &'a str,
    object: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SegmentRequest<'a> {
    image_url: &'a str,
    object: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    spatial_refs: Option<&'a [SpatialRef]>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<SamplingSettings>,
}

// --- Wire response bodies ---

#[derive(Debug, Deserialize)]
struct CaptionResponse {
    caption: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    answer: String,
    #[serde(default)]
    reasoning: Option<Reasoning>,
}

/// Client for a Moondream HTTP endpoint
#[derive(Clone)]
pub struct CloudVl {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for CloudVl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudVl")
            .field("api_url", &self.api_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl CloudVl {
    /// Create a client from configuration
    ///
    /// Fails with [`MoondreamError::Config`] when cloud mode has no API key;
    /// nothing is sent over the network here.
    pub fn new(config: VlConfig) -> Result<Self> {
        let connection = config.resolve()?;

        let mut builder = Client::builder().user_agent(version::user_agent());
        if let Some(timeout) = connection.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        info!(
            "Moondream client configured: endpoint={}, mode={}",
            connection.api_url,
            if config.local { "local" } else { "cloud" }
        );

        Ok(Self {
            client,
            api_url: connection.api_url,
            api_key: connection.api_key,
        })
    }

    /// Client for a server on [`LOCAL_API_URL`] without authentication
    pub fn local() -> Result<Self> {
        Self::new(VlConfig::local())
    }

    /// Base URL requests are sent to
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn is_local(&self) -> bool {
        self.api_url == LOCAL_API_URL && self.api_key.is_none()
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{}", self.api_url, operation)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        body: &B,
        stream: bool,
    ) -> Result<Response> {
        let url = self.endpoint(operation);
        debug!("Moondream {} POST {} (stream={})", operation, url, stream);

        let mut request = self.client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.header(AUTH_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Moondream {} returned {}: {}", operation, status, message);
            return Err(MoondreamError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn post_json<B, T>(&self, operation: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(operation, body, false).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            MoondreamError::Decode(format!("invalid {} response: {}", operation, e))
        })
    }

    async fn post_stream<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<ByteStream> {
        let response = self.send(operation, body, true).await?;
        Ok(Box::pin(response.bytes_stream()))
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MoondreamError::InvalidRequest(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

fn validate_settings(settings: Option<&SamplingSettings>) -> Result<()> {
    settings.map_or(Ok(()), SamplingSettings::validate)
}

#[async_trait]
impl Vlm for CloudVl {
    async fn encode_image(&self, image: ImageInput<'_>) -> Result<EncodedImage> {
        image.encode_blocking().await
    }

    async fn caption(
        &self,
        image: ImageInput<'_>,
        options: CaptionOptions,
    ) -> Result<CaptionOutput> {
        validate_settings(options.settings.as_ref())?;
        let encoded = image.encode_blocking().await?;

        let body = CaptionRequest {
            image_url: encoded.image_url(),
            length: options.length,
            stream: options.stream,
            settings: options.settings,
            variant: options.variant.as_deref(),
        };

        let caption = if options.stream {
            TextOutput::Streaming(text_stream(self.post_stream("caption", &body).await?))
        } else {
            let response: CaptionResponse = self.post_json("caption", &body).await?;
            TextOutput::Complete(response.caption)
        };

        Ok(CaptionOutput { caption })
    }

    async fn query(
        &self,
        image: Option<ImageInput<'_>>,
        question: &str,
        options: QueryOptions,
    ) -> Result<QueryOutput> {
        require_text("question", question)?;
        validate_settings(options.settings.as_ref())?;
        if options.reasoning && options.stream {
            return Err(MoondreamError::InvalidRequest(
                "reasoning is not available for streamed queries".to_string(),
            ));
        }

        let encoded = match image {
            Some(image) => Some(image.encode_blocking().await?),
            None => None,
        };
        let body = QueryRequest {
            image_url: encoded.as_ref().map(EncodedImage::image_url),
            question,
            stream: options.stream,
            settings: options.settings,
            reasoning: options.reasoning,
            variant: options.variant.as_deref(),
        };

        if options.stream {
            let fragments = text_stream(self.post_stream("query", &body).await?);
            return Ok(QueryOutput {
                answer: TextOutput::Streaming(fragments),
                reasoning: None,
            });
        }

        let response: QueryResponse = self.post_json("query", &body).await?;
        Ok(QueryOutput {
            answer: TextOutput::Complete(response.answer),
            reasoning: response.reasoning.filter(|_| options.reasoning),
        })
    }

    async fn detect(
        &self,
        image: ImageInput<'_>,
        object: &str,
        variant: Option<String>,
    ) -> Result<DetectOutput> {
        require_text("object", object)?;
        let encoded = image.encode_blocking().await?;
        let body = ObjectRequest {
            image_url: encoded.image_url(),
            object,
            variant: variant.as_deref(),
        };
        self.post_json("detect", &body).await
    }

    async fn point(
        &self,
        image: ImageInput<'_>,
        object: &str,
        variant: Option<String>,
    ) -> Result<PointOutput> {
        require_text("object", object)?;
        let encoded = image.encode_blocking().await?;
        let body = ObjectRequest {
            image_url: encoded.image_url(),
            object,
            variant: variant.as_deref(),
        };
        self.post_json("point", &body).await
    }

    async fn segment(
        &self,
        image: ImageInput<'_>,
        object: &str,
        options: SegmentOptions,
    ) -> Result<SegmentResult> {
        require_text("object", object)?;
        validate_settings(options.settings.as_ref())?;
        let spatial_refs = options.spatial_refs.as_deref().filter(|refs| !refs.is_empty());
        if let Some(refs) = spatial_refs {
            refs.iter().try_for_each(SpatialRef::validate)?;
        }

        let encoded = image.encode_blocking().await?;
        let body = SegmentRequest {
            image_url: encoded.image_url(),
            object,
            spatial_refs,
            stream: options.stream,
            settings: options.settings,
        };

        if options.stream {
            let updates = segment_stream(self.post_stream("segment", &body).await?);
            return Ok(SegmentResult::Streaming(updates));
        }

        let output: SegmentOutput = self.post_json("segment", &body).await?;
        Ok(SegmentResult::Complete(output))
    }
}
