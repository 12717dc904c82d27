// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;
pub mod compare;
pub mod smoke;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::DynamicImage;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::VlConfig;
use crate::version;

/// Moondream CLI
#[derive(Parser, Debug)]
#[command(name = "moondream-cli")]
#[command(version)]
#[command(
    about = "Run Moondream vision-language operations against the cloud API or a local server",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where and how to connect
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// API key for the cloud endpoint
    #[arg(long, env = "MOONDREAM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override the API base URL
    #[arg(long, env = "MOONDREAM_API_URL")]
    pub api_url: Option<String>,

    /// Use the local server on localhost:8000 (no API key)
    #[arg(long)]
    pub local: bool,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl ConnectionArgs {
    pub fn to_config(&self) -> VlConfig {
        VlConfig {
            api_key: self.api_key.clone(),
            api_url: self.api_url.clone(),
            local: self.local,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Caption an image
    Caption(commands::CaptionArgs),

    /// Ask a question about an image
    Query(commands::QueryArgs),

    /// Detect bounding boxes of an object
    Detect(commands::ObjectArgs),

    /// Point at instances of an object
    Point(commands::ObjectArgs),

    /// Segment an object into an SVG path
    Segment(commands::SegmentArgs),

    /// Run every operation once against an image and report failures
    Smoke(smoke::SmokeArgs),

    /// Compare the cloud API (using the connection flags) against the local server
    Compare(compare::CompareArgs),

    /// Print client version details as JSON
    Version,
}

/// Execute CLI command
///
/// `.env` is loaded by the binary before argument parsing so clap can see it.
pub async fn execute(cli: Cli) -> Result<()> {
    if let Commands::Version = cli.command {
        println!("{}", serde_json::to_string_pretty(&version::get_version_info())?);
        return Ok(());
    }

    info!("{}", version::get_version_string());

    let command = match cli.command {
        Commands::Compare(args) => {
            let config = VlConfig {
                local: false,
                ..cli.connection.to_config()
            };
            let cloud = crate::vl(config).context("failed to create cloud client")?;
            let local = crate::CloudVl::local().context("failed to create local client")?;
            return compare::run(&cloud, &local, args).await;
        }
        command => command,
    };

    let client =
        crate::vl(cli.connection.to_config()).context("failed to create Moondream client")?;

    match command {
        Commands::Caption(args) => commands::caption(&client, args).await,
        Commands::Query(args) => commands::query(&client, args).await,
        Commands::Detect(args) => commands::detect(&client, args).await,
        Commands::Point(args) => commands::point(&client, args).await,
        Commands::Segment(args) => commands::segment(&client, args).await,
        Commands::Smoke(args) => smoke::run(&client, args).await,
        Commands::Compare(_) | Commands::Version => Ok(()),
    }
}

/// Log filter from a `RUST_LOG`-style value, `info` when unset or invalid
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Open and decode an image file
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        anyhow::bail!("image not found at path '{}'", path.display());
    }
    image::open(path).with_context(|| format!("failed to load image '{}'", path.display()))
}
