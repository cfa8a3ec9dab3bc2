//! Data models shared by the scraping, composition and rendering stages.
//!
//! - [`LanguageMode`]: which language instructions the prompt carries
//! - [`ScrapeResult`] / [`ScrapeError`]: the tagged outcome of one page fetch
//! - [`Branding`]: organization name used in prompts, footers and filenames

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Language layout of the generated report.
///
/// Only the prompt text changes between modes; control flow is identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LanguageMode {
    /// Chinese report that keeps Spanish institution, law and project names in parentheses.
    #[default]
    SourceGlossary,
    /// Chinese only, no Spanish text at all.
    TargetOnly,
    /// A full Spanish block followed by a full Chinese block for every item.
    Bilingual,
}

impl LanguageMode {
    pub const ALL: [LanguageMode; 3] = [
        LanguageMode::SourceGlossary,
        LanguageMode::TargetOnly,
        LanguageMode::Bilingual,
    ];

    /// Form value, identical to the CLI spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageMode::SourceGlossary => "source-glossary",
            LanguageMode::TargetOnly => "target-only",
            LanguageMode::Bilingual => "bilingual",
        }
    }

    /// Human-readable label for the radio buttons.
    pub fn label(&self) -> &'static str {
        match self {
            LanguageMode::SourceGlossary => "中文 + 西语术语",
            LanguageMode::TargetOnly => "纯中文",
            LanguageMode::Bilingual => "西中对照",
        }
    }
}

/// Why a single page could not be scraped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrapeError {
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("{0}")]
    Request(String),
    #[error("worker failed: {0}")]
    Worker(String),
}

impl ScrapeError {
    /// Inline placeholder embedded in the scraped block in place of page text.
    pub fn placeholder(&self) -> String {
        match self {
            ScrapeError::HttpStatus(code) => format!("[网页错误: {code}]"),
            other => format!("[抓取出错: {other}]"),
        }
    }
}

/// The outcome of scraping one URL. Produced once per submitted URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    pub url: String,
    pub outcome: Result<String, ScrapeError>,
}

impl ScrapeResult {
    pub fn ok(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: Ok(text.into()),
        }
    }

    pub fn failed(url: impl Into<String>, error: ScrapeError) -> Self {
        Self {
            url: url.into(),
            outcome: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Page text, or the failure placeholder.
    pub fn display_text(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(e) => e.placeholder(),
        }
    }
}

/// Organization the digest is written for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub organization: String,
}

impl Branding {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
        }
    }

    /// `<org>_Report_<date>.<ext>` with whitespace in the name replaced.
    pub fn report_filename(&self, date: chrono::NaiveDate, ext: &str) -> String {
        let org: String = self
            .organization
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
            .collect();
        format!("{}_Report_{}.{}", org, date.format("%Y-%m-%d"), ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_language_mode_spellings_match_serde() {
        for mode in LanguageMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
            let value = mode.to_possible_value().unwrap();
            assert_eq!(value.get_name(), mode.as_str());
        }
    }

    #[test]
    fn test_language_mode_default() {
        assert_eq!(LanguageMode::default(), LanguageMode::SourceGlossary);
    }

    #[test]
    fn test_status_placeholder_embeds_code() {
        let result = ScrapeResult::failed("https://x.example", ScrapeError::HttpStatus(404));
        assert!(!result.is_ok());
        assert_eq!(result.display_text(), "[网页错误: 404]");
    }

    #[test]
    fn test_request_placeholder_embeds_description() {
        let err = ScrapeError::Request("connection refused".to_string());
        assert_eq!(err.placeholder(), "[抓取出错: connection refused]");

        let err = ScrapeError::Timeout("operation timed out".to_string());
        assert!(err.placeholder().starts_with("[抓取出错: timeout"));
    }

    #[test]
    fn test_ok_display_text_is_content() {
        let result = ScrapeResult::ok("https://x.example", "body");
        assert!(result.is_ok());
        assert_eq!(result.display_text(), "body");
    }

    #[test]
    fn test_report_filename() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let branding = Branding::new("Chilquinta");
        assert_eq!(
            branding.report_filename(date, "html"),
            "Chilquinta_Report_2025-03-07.html"
        );
        let spaced = Branding::new(" Acme Energy ");
        assert_eq!(
            spaced.report_filename(date, "docx"),
            "Acme_Energy_Report_2025-03-07.docx"
        );
    }
}
