//! Stage sequencing for one digest run.
//!
//! validate → scrape (barrier) → assemble → compose. Rendering is left to the
//! caller so the CLI and the web front end can route artifacts differently.

use crate::api::{AskAsync, GeminiClient};
use crate::brief::{Brief, compose_brief};
use crate::config::{AppConfig, ConfigError};
use crate::links::{InputError, validate_input};
use crate::models::{Branding, LanguageMode, ScrapeResult};
use crate::scrapers::{ProgressSink, Scraper, assemble_block};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Outcome of a run that got past input validation.
#[derive(Debug, Clone)]
pub struct Digest {
    pub urls: Vec<String>,
    pub results: Vec<ScrapeResult>,
    pub brief: Brief,
}

impl Digest {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_ok()).count()
    }
}

#[derive(Clone)]
pub struct DigestPipeline {
    scraper: Scraper,
    llm: Arc<dyn AskAsync>,
    branding: Branding,
}

impl DigestPipeline {
    pub fn new(scraper: Scraper, llm: Arc<dyn AskAsync>, branding: Branding) -> Self {
        Self {
            scraper,
            llm,
            branding,
        }
    }

    /// Scraper and Gemini client both built from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Scraper::new(config)?,
            Arc::new(GeminiClient::new(config)?),
            config.branding(),
        ))
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    /// Run every stage. Only input problems are errors; fetch and model
    /// failures are carried inside the returned [`Digest`].
    #[instrument(level = "info", skip_all, fields(?mode, %date, input_chars = raw_input.chars().count()))]
    pub async fn run(
        &self,
        raw_input: &str,
        mode: LanguageMode,
        date: NaiveDate,
        progress: &dyn ProgressSink,
    ) -> Result<Digest, InputError> {
        let t0 = Instant::now();
        let urls = validate_input(raw_input)?;
        info!(count = urls.len(), "Found links");

        let results = self.scraper.scrape_all(&urls, progress).await;
        let block = assemble_block(&results);

        let brief = compose_brief(
            self.llm.as_ref(),
            mode,
            &self.branding.organization,
            date,
            raw_input,
            &block,
        )
        .await;

        let digest = Digest {
            urls,
            results,
            brief,
        };
        info!(
            links = digest.urls.len(),
            failed = digest.failed_count(),
            report = digest.brief.is_report(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Digest finished"
        );
        Ok(digest)
    }
}
