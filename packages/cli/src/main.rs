#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the fire map pipeline.
//!
//! Each subcommand runs one stage to completion and exits; `run` chains all
//! of them. Scheduling is left to the caller (cron, CI, a systemd timer).
//!
//! Uses `indicatif-log-bridge` (via [`fire_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use fire_map_cli_utils::StageProgress;
use fire_map_pipeline::config::CONFIG_ENV;
use fire_map_pipeline::{PipelineConfig, fetch, publish, render, run_all, transform};
use fire_map_source::firms::FirmsProvider;

#[derive(Parser)]
#[command(name = "fire_map", about = "VIIRS active fire map pipeline")]
struct Cli {
    /// Pipeline config file (defaults to the embedded configuration)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download recent detections and the boundary, and merge into the store
    Fetch,
    /// Convert the boundary and clip recent stored detections to it
    Transform,
    /// Render the interactive HTML map
    Render,
    /// Upload the rendered map to the configured bucket
    Publish,
    /// Run every stage in order
    Run,
}

impl Commands {
    const fn label(&self) -> &'static str {
        match self {
            Self::Fetch => "Fetching detections",
            Self::Transform => "Clipping to boundary",
            Self::Render => "Rendering map",
            Self::Publish => "Publishing map",
            Self::Run => "Running pipeline",
        }
    }
}

fn provider(config: &PipelineConfig) -> Result<FirmsProvider, Box<dyn std::error::Error>> {
    Ok(FirmsProvider::new(config.firms_options()?)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = fire_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;
    let now = Utc::now();
    let progress = StageProgress::spinner(&multi, cli.command.label());

    let summary = match cli.command {
        Commands::Fetch => {
            let provider = provider(&config)?;
            fetch::run(&config, &provider, now).await?.to_string()
        }
        Commands::Transform => transform::run(&config, now)?.to_string(),
        Commands::Render => render::run(&config)?.to_string(),
        Commands::Publish => publish::run(&config).await.to_string(),
        Commands::Run => {
            let provider = provider(&config)?;
            run_all(&config, &provider, now).await?.to_string()
        }
    };

    progress.finish_and_clear();
    log::info!("Done: {summary}");

    Ok(())
}
