//! # news_brief
//!
//! Turns a pasted block of chat messages containing news links into a
//! formatted daily digest. Every linked page is scraped concurrently, the
//! raw messages plus the scraped text go to Gemini in a single call, and the
//! resulting markdown is rendered as a styled HTML page and a Word document.
//!
//! ## Usage
//!
//! ```sh
//! news_brief generate --input messages.txt --mode bilingual --output-dir ./reports
//! news_brief serve --bind 127.0.0.1:8501
//! ```
//!
//! ## Architecture
//!
//! 1. **Validation**: reject empty input or input without links
//! 2. **Scraping**: fetch all links, at most `max_concurrency` at a time
//! 3. **Composition**: one prompt, one model call, one markdown report
//! 4. **Output**: `.md`, `.html` and `.docx` named after the organization and date

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod brief;
mod cli;
mod config;
mod links;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;
mod web;

use cli::{Cli, Command};
use config::AppConfig;
use models::LanguageMode;
use pipeline::DigestPipeline;
use scrapers::LogProgress;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_brief starting up");

    let args = Cli::parse();
    debug!(config = ?args.config, command = ?args.command, "Parsed CLI arguments");

    let config = AppConfig::load(args.config.as_deref(), args.overrides())?;
    let pipeline = DigestPipeline::from_config(&config)?;

    match args.command {
        Command::Generate {
            input,
            mode,
            output_dir,
        } => generate(&pipeline, &input, mode, &output_dir).await?,
        Command::Serve { bind } => web::serve(bind, web::AppState::new(pipeline)).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// One-shot run: read input, build the report, write all three files.
#[instrument(level = "info", skip(pipeline))]
async fn generate(
    pipeline: &DigestPipeline,
    input: &str,
    mode: LanguageMode,
    output_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    // Early check: ensure output dir is writable before any network work
    if let Err(e) = ensure_writable_dir(output_dir).await {
        error!(
            path = %output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let raw = read_input(input).await?;
    let date = Local::now().date_naive();

    let digest = match pipeline.run(&raw, mode, date, &LogProgress).await {
        Ok(digest) => digest,
        Err(e) => {
            error!(error = %e, "Rejected input");
            return Err(e.user_message().into());
        }
    };

    let markdown = digest.brief.markdown();
    let artifacts = outputs::render_artifacts(&markdown, pipeline.branding(), date)?;
    let written = outputs::write_artifacts(&artifacts, output_dir).await?;
    info!(files = written.len(), "Report written");

    println!("{markdown}");
    Ok(())
}

async fn read_input(input: &str) -> Result<String, Box<dyn Error>> {
    let raw = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(input).await?
    };
    debug!(chars = raw.chars().count(), "Read input");
    Ok(raw)
}
