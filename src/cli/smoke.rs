// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end check of every operation against one image
//!
//! Each operation runs independently: a failure is logged and recorded, and
//! the remaining operations still run.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use image::DynamicImage;
use tracing::{error, info, warn};

use super::load_image;
use crate::input::{EncodedImage, ImageInput};
use crate::types::{
    CaptionLength, CaptionOptions, QueryOptions, SamplingSettings, SegmentOptions,
};
use crate::vlm::Vlm;

/// Arguments for the smoke command
#[derive(Args, Debug)]
pub struct SmokeArgs {
    /// Image file to run against
    pub image: PathBuf,

    /// Question for the query check
    #[arg(long, default_value = "What's in the image?")]
    pub question: String,

    /// Object for the detect and segment checks
    #[arg(long, default_value = "face")]
    pub detect_object: String,

    /// Object for the point check
    #[arg(long, default_value = "person")]
    pub point_object: String,

    /// Token limit sent with the non-streamed caption and query checks
    #[arg(long, default_value_t = 10)]
    pub max_tokens: u32,
}

/// Outcome of one operation
#[derive(Debug)]
pub struct CheckResult {
    pub name: &'static str,
    /// Summary of the output on success, error message on failure
    pub outcome: std::result::Result<String, String>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct SmokeReport {
    pub checks: Vec<CheckResult>,
}

impl SmokeReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    fn record(&mut self, name: &'static str, outcome: crate::error::Result<String>) {
        match &outcome {
            Ok(summary) => info!("{} ok: {}", name, summary),
            Err(e) => error!("{} failed: {}", name, e),
        }
        self.checks.push(CheckResult {
            name,
            outcome: outcome.map_err(|e| e.to_string()),
        });
    }
}

/// Questions, objects and settings used by the checks
#[derive(Debug, Clone)]
pub struct SmokePrompts {
    pub question: String,
    pub detect_object: String,
    pub point_object: String,
    pub settings: Option<SamplingSettings>,
}

impl Default for SmokePrompts {
    fn default() -> Self {
        Self {
            question: "What's in the image?".to_string(),
            detect_object: "face".to_string(),
            point_object: "person".to_string(),
            settings: None,
        }
    }
}

/// Run every operation once and collect the outcomes
///
/// The image is encoded once up front and reused; if the backend cannot
/// encode out of band, the raw image is sent with each call instead.
pub async fn run_checks(
    client: &dyn Vlm,
    image: &DynamicImage,
    prompts: &SmokePrompts,
) -> SmokeReport {
    let mut report = SmokeReport::default();

    let encoded: Option<EncodedImage> = match client.encode_image(ImageInput::from(image)).await {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            warn!("encode_image unavailable, sending raw image per call: {}", e);
            None
        }
    };
    let input = match &encoded {
        Some(encoded) => ImageInput::from(encoded),
        None => ImageInput::from(image),
    };

    let options = CaptionOptions {
        settings: prompts.settings,
        ..Default::default()
    };
    let outcome = match client.caption(input, options).await {
        Ok(output) => output.caption.collect().await,
        Err(e) => Err(e),
    };
    report.record("caption", outcome);

    let options = CaptionOptions {
        length: CaptionLength::Long,
        stream: true,
        ..Default::default()
    };
    let outcome = match client.caption(input, options).await {
        Ok(output) => output.caption.collect().await,
        Err(e) => Err(e),
    };
    report.record("caption_stream", outcome);

    let options = QueryOptions {
        settings: prompts.settings,
        ..Default::default()
    };
    let outcome = match client.query(Some(input), &prompts.question, options).await {
        Ok(output) => output.answer.collect().await,
        Err(e) => Err(e),
    };
    report.record("query", outcome);

    let options = QueryOptions {
        stream: true,
        ..Default::default()
    };
    let outcome = match client.query(Some(input), &prompts.question, options).await {
        Ok(output) => output.answer.collect().await,
        Err(e) => Err(e),
    };
    report.record("query_stream", outcome);

    let outcome = client
        .detect(input, &prompts.detect_object, None)
        .await
        .map(|output| format!("{} object(s)", output.objects.len()));
    report.record("detect", outcome);

    let outcome = client
        .point(input, &prompts.point_object, None)
        .await
        .map(|output| format!("{} point(s)", output.points.len()));
    report.record("point", outcome);

    let outcome = match client
        .segment(input, &prompts.detect_object, SegmentOptions::default())
        .await
    {
        Ok(result) => result
            .into_output()
            .await
            .map(|output| format!("path of {} chars", output.path.len())),
        Err(e) => Err(e),
    };
    report.record("segment", outcome);

    report
}

pub async fn run(client: &dyn Vlm, args: SmokeArgs) -> Result<()> {
    let image = load_image(&args.image)?;
    let prompts = SmokePrompts {
        question: args.question,
        detect_object: args.detect_object,
        point_object: args.point_object,
        settings: Some(SamplingSettings::max_tokens(args.max_tokens)),
    };

    let report = run_checks(client, &image, &prompts).await;
    let failed = report.failures().count();
    println!(
        "{} of {} checks passed",
        report.checks.len() - failed,
        report.checks.len()
    );
    for check in report.failures() {
        if let Err(message) = &check.outcome {
            println!("  {} failed: {}", check.name, message);
        }
    }

    if !report.is_success() {
        anyhow::bail!("{} check(s) failed", failed);
    }
    Ok(())
}
