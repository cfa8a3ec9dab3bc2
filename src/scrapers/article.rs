//! Single-page fetch and readable-text extraction.
//!
//! Extraction is paragraph-first: the text of every `<p>` element, one per
//! line. Pages whose paragraphs carry almost nothing (lite sites, SPA shells)
//! fall back to all visible text of the document.

use crate::config::{AppConfig, ConfigError};
use crate::models::{ScrapeError, ScrapeResult};
use crate::utils::{squeeze_lines, truncate_chars};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use scraper::{Html, Node, Selector};
use tracing::{debug, instrument, warn};

static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("static paragraph selector"));

/// Elements whose text never reaches the reader.
const INVISIBLE_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Limits applied to every extracted page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub min_paragraph_chars: usize,
    pub max_chars: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 50,
            max_chars: 2500,
        }
    }
}

/// Fetches one article and turns it into prompt-ready text.
#[derive(Debug, Clone)]
pub struct ArticleFetcher {
    client: Client,
    limits: ExtractLimits,
}

impl ArticleFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout());
        let client = config
            .apply_proxy(builder)?
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self {
            client,
            limits: ExtractLimits {
                min_paragraph_chars: config.min_paragraph_chars,
                max_chars: config.max_chars_per_page,
            },
        })
    }

    /// Fetch `url` and extract its text. Never fails: errors are folded
    /// into the returned result.
    #[instrument(level = "debug", skip(self))]
    pub async fn scrape(&self, url: &str) -> ScrapeResult {
        match self.fetch_text(url).await {
            Ok(text) => {
                debug!(chars = text.chars().count(), "Extracted article text");
                ScrapeResult::ok(url, text)
            }
            Err(e) => {
                warn!(error = %e, "Article fetch failed");
                ScrapeResult::failed(url, e)
            }
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::HttpStatus(status.as_u16()));
        }
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(extract_readable_text(&body, self.limits))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ScrapeError {
    if err.is_timeout() {
        ScrapeError::Timeout(err.to_string())
    } else {
        ScrapeError::Request(err.to_string())
    }
}

/// Paragraph text, or all visible text when paragraphs are too thin,
/// truncated to `limits.max_chars` characters.
pub fn extract_readable_text(html: &str, limits: ExtractLimits) -> String {
    let document = Html::parse_document(html);

    let paragraphs: Vec<String> = document
        .select(&PARAGRAPH_SELECTOR)
        .map(|p| p.text().collect::<String>())
        .collect();
    let mut text = squeeze_lines(paragraphs.iter().map(String::as_str));

    if text.chars().count() < limits.min_paragraph_chars {
        text = visible_text(&document);
    }

    truncate_chars(&text, limits.max_chars)
}

fn visible_text(document: &Html) -> String {
    let chunks = document.root_element().descendants().filter_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| INVISIBLE_ELEMENTS.contains(&el.name()))
        });
        if hidden { None } else { Some(&**text) }
    });
    squeeze_lines(chunks)
}
