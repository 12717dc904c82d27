// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Send the same requests to two backends and report whether they agree
//!
//! Used to check a local server against the hosted API. Each operation is
//! compared independently; a failure on either side is recorded and the
//! remaining operations still run.

use std::fmt::Debug;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use image::DynamicImage;
use tracing::{error, info};

use super::load_image;
use super::smoke::SmokePrompts;
use crate::error::Result as VlResult;
use crate::input::ImageInput;
use crate::types::{CaptionOptions, QueryOptions};
use crate::vlm::Vlm;

/// Arguments for the compare command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Image file to run against
    pub image: PathBuf,

    /// Question for the query comparison
    #[arg(long, default_value = "What's in the image?")]
    pub question: String,

    /// Object for the detect comparison
    #[arg(long, default_value = "face")]
    pub detect_object: String,

    /// Object for the point comparison
    #[arg(long, default_value = "person")]
    pub point_object: String,
}

/// Outcome of comparing one operation
#[derive(Debug)]
pub struct Comparison {
    pub name: &'static str,
    /// Whether both outputs were equal, or the error that prevented comparing
    pub outcome: std::result::Result<bool, String>,
}

impl Comparison {
    fn new<T: PartialEq + Debug>(
        name: &'static str,
        cloud: VlResult<T>,
        local: VlResult<T>,
    ) -> Self {
        let outcome = match (cloud, local) {
            (Ok(cloud), Ok(local)) => {
                info!("{} cloud: {:?}", name, cloud);
                info!("{} local: {:?}", name, local);
                Ok(cloud == local)
            }
            (Err(e), _) => Err(format!("cloud: {}", e)),
            (_, Err(e)) => Err(format!("local: {}", e)),
        };
        if let Err(message) = &outcome {
            error!("{} comparison failed: {}", name, message);
        }
        Self { name, outcome }
    }

    pub fn is_identical(&self) -> bool {
        matches!(self.outcome, Ok(true))
    }
}

async fn caption_text(client: &dyn Vlm, image: ImageInput<'_>) -> VlResult<String> {
    client
        .caption(image, CaptionOptions::default())
        .await?
        .caption
        .collect()
        .await
}

async fn answer_text(
    client: &dyn Vlm,
    image: ImageInput<'_>,
    question: &str,
) -> VlResult<String> {
    client
        .query(Some(image), question, QueryOptions::default())
        .await?
        .answer
        .collect()
        .await
}

/// Run caption, query, detect and point on both backends
pub async fn compare_backends(
    cloud: &dyn Vlm,
    local: &dyn Vlm,
    image: &DynamicImage,
    prompts: &SmokePrompts,
) -> Vec<Comparison> {
    let input = ImageInput::from(image);

    vec![
        Comparison::new(
            "caption",
            caption_text(cloud, input).await,
            caption_text(local, input).await,
        ),
        Comparison::new(
            "query",
            answer_text(cloud, input, &prompts.question).await,
            answer_text(local, input, &prompts.question).await,
        ),
        Comparison::new(
            "detect",
            cloud.detect(input, &prompts.detect_object, None).await,
            local.detect(input, &prompts.detect_object, None).await,
        ),
        Comparison::new(
            "point",
            cloud.point(input, &prompts.point_object, None).await,
            local.point(input, &prompts.point_object, None).await,
        ),
    ]
}

pub async fn run(cloud: &dyn Vlm, local: &dyn Vlm, args: CompareArgs) -> Result<()> {
    let image = load_image(&args.image)?;
    let prompts = SmokePrompts {
        question: args.question,
        detect_object: args.detect_object,
        point_object: args.point_object,
        settings: None,
    };

    let comparisons = compare_backends(cloud, local, &image, &prompts).await;
    for comparison in &comparisons {
        match &comparison.outcome {
            Ok(true) => println!("{}: identical", comparison.name),
            Ok(false) => println!("{}: differ", comparison.name),
            Err(message) => println!("{}: failed ({})", comparison.name, message),
        }
    }

    let failed = comparisons.iter().filter(|c| c.outcome.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{} comparison(s) failed", failed);
    }
    Ok(())
}
