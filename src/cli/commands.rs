// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-operation CLI commands

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use futures::StreamExt;

use super::load_image;
use crate::input::ImageInput;
use crate::types::{
    CaptionLength, CaptionOptions, QueryOptions, SamplingSettings, SegmentOptions, SegmentResult,
    SpatialRef, TextOutput,
};
use crate::vlm::Vlm;

/// Arguments for the caption command
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image file to caption
    pub image: PathBuf,

    /// Caption length (short, normal, long)
    #[arg(long, default_value = "normal")]
    pub length: CaptionLength,

    /// Print tokens as they arrive
    #[arg(long)]
    pub stream: bool,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Model variant
    #[arg(long)]
    pub variant: Option<String>,
}

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Image file to ask about
    pub image: PathBuf,

    /// Question to answer
    pub question: String,

    /// Print tokens as they arrive
    #[arg(long, conflicts_with = "reasoning")]
    pub stream: bool,

    /// Return grounded reasoning with the answer
    #[arg(long)]
    pub reasoning: bool,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Model variant
    #[arg(long)]
    pub variant: Option<String>,
}

/// Arguments for the detect and point commands
#[derive(Args, Debug)]
pub struct ObjectArgs {
    /// Image file to analyze
    pub image: PathBuf,

    /// Object to look for
    pub object: String,

    /// Model variant
    #[arg(long)]
    pub variant: Option<String>,
}

/// Arguments for the segment command
#[derive(Args, Debug)]
pub struct SegmentArgs {
    /// Image file to segment
    pub image: PathBuf,

    /// Object to segment
    pub object: String,

    /// Spatial hint: "x,y" point or "x_min,y_min,x_max,y_max" box, normalized
    #[arg(long = "ref", value_parser = parse_spatial_ref)]
    pub spatial_refs: Vec<SpatialRef>,

    /// Print updates as they arrive
    #[arg(long)]
    pub stream: bool,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

/// Parse "x,y" or "x_min,y_min,x_max,y_max"
pub fn parse_spatial_ref(value: &str) -> std::result::Result<SpatialRef, String> {
    let values = value
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in '{}': {}", value, e))?;
    let spatial_ref = SpatialRef::try_from(values.as_slice()).map_err(|e| e.to_string())?;
    spatial_ref.validate().map_err(|e| e.to_string())?;
    Ok(spatial_ref)
}

fn settings(max_tokens: Option<u32>) -> Option<SamplingSettings> {
    max_tokens.map(SamplingSettings::max_tokens)
}

/// Print text, streaming fragments to stdout as they arrive
async fn print_text(label: &str, text: TextOutput) -> Result<()> {
    match text {
        TextOutput::Complete(text) => println!("{}: {}", label, text),
        TextOutput::Streaming(mut stream) => {
            print!("{}: ", label);
            while let Some(fragment) = stream.next().await {
                print!("{}", fragment?);
                std::io::stdout().flush()?;
            }
            println!();
        }
    }
    Ok(())
}

pub async fn caption(client: &dyn Vlm, args: CaptionArgs) -> Result<()> {
    let image = load_image(&args.image)?;
    let options = CaptionOptions {
        length: args.length,
        stream: args.stream,
        settings: settings(args.max_tokens),
        variant: args.variant,
    };
    let output = client.caption(ImageInput::from(&image), options).await?;
    print_text("Caption", output.caption).await
}

pub async fn query(client: &dyn Vlm, args: QueryArgs) -> Result<()> {
    let image = load_image(&args.image)?;
    let options = QueryOptions {
        stream: args.stream,
        settings: settings(args.max_tokens),
        reasoning: args.reasoning,
        variant: args.variant,
    };
    let output = client
        .query(Some(ImageInput::from(&image)), &args.question, options)
        .await?;
    if let Some(reasoning) = &output.reasoning {
        println!("Reasoning: {}", reasoning.text);
        for span in &reasoning.grounding {
            println!(
                "  [{}..{}] {:?}",
                span.start_idx, span.end_idx, span.points
            );
        }
    }
    print_text("Answer", output.answer).await
}

pub async fn detect(client: &dyn Vlm, args: ObjectArgs) -> Result<()> {
    let image = load_image(&args.image)?;
    let output = client
        .detect(ImageInput::from(&image), &args.object, args.variant)
        .await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub async fn point(client: &dyn Vlm, args: ObjectArgs) -> Result<()> {
    let image = load_image(&args.image)?;
    let output = client
        .point(ImageInput::from(&image), &args.object, args.variant)
        .await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub async fn segment(client: &dyn Vlm, args: SegmentArgs) -> Result<()> {
    let image = load_image(&args.image)?;
    let options = SegmentOptions {
        spatial_refs: Some(args.spatial_refs),
        stream: args.stream,
        settings: settings(args.max_tokens),
    };
    match client
        .segment(ImageInput::from(&image), &args.object, options)
        .await?
    {
        SegmentResult::Complete(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        SegmentResult::Streaming(mut updates) => {
            while let Some(update) = updates.next().await {
                println!("{}", serde_json::to_string(&update?)?);
            }
        }
    }
    Ok(())
}
