//! Concurrent article scraping.
//!
//! [`Scraper::scrape_all`] fans a URL list out over a bounded pool of tokio
//! tasks and fans the results back in once every job has finished.
//!
//! - At most `max_concurrency` fetches are in flight; the rest wait for a slot
//! - Results arrive in completion order, not submission order
//! - Every URL yields exactly one [`ScrapeResult`], even if its task panics
//! - A [`ProgressSink`] sees each completion as it happens

pub mod article;

use crate::config::{AppConfig, ConfigError};
use crate::models::{ScrapeError, ScrapeResult};
use crate::utils::truncate_for_log;
use article::ArticleFetcher;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Turns one URL into one result. Implementations fold every failure into
/// the returned [`ScrapeResult`].
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn scrape(&self, url: &str) -> ScrapeResult;
}

#[async_trait]
impl PageSource for ArticleFetcher {
    async fn scrape(&self, url: &str) -> ScrapeResult {
        ArticleFetcher::scrape(self, url).await
    }
}

/// Observer for incremental scrape completions.
pub trait ProgressSink: Send + Sync {
    /// Called once per finished URL; `done` counts from 1 up to `total`.
    fn scraped(&self, done: usize, total: usize, result: &ScrapeResult);
}

/// Logs every completion through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn scraped(&self, done: usize, total: usize, result: &ScrapeResult) {
        let url = truncate_for_log(&result.url, 60);
        match &result.outcome {
            Ok(text) => info!(done, total, %url, chars = text.chars().count(), "✅ scraped"),
            Err(e) => warn!(done, total, %url, error = %e, "❌ scrape failed"),
        }
    }
}

#[derive(Clone)]
pub struct Scraper {
    source: Arc<dyn PageSource>,
    max_concurrency: usize,
}

impl Scraper {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_source(
            Arc::new(ArticleFetcher::new(config)?),
            config.max_concurrency,
        ))
    }

    pub fn with_source(source: Arc<dyn PageSource>, max_concurrency: usize) -> Self {
        Self {
            source,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Scrape every URL and wait for all of them.
    ///
    /// The returned vector has exactly `urls.len()` entries, in completion order.
    #[instrument(level = "info", skip_all, fields(total = urls.len(), max_concurrency = self.max_concurrency))]
    pub async fn scrape_all(&self, urls: &[String], progress: &dyn ProgressSink) -> Vec<ScrapeResult> {
        let total = urls.len();
        let t0 = Instant::now();
        info!(
            workers = self.max_concurrency.min(total),
            "Scraping {} links",
            total
        );

        let results: Vec<ScrapeResult> = stream::iter(urls.iter().cloned())
            .map(|url| {
                let source = Arc::clone(&self.source);
                async move {
                    let task_url = url.clone();
                    let handle = tokio::spawn(async move { source.scrape(&task_url).await });
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => ScrapeResult::failed(url, ScrapeError::Worker(e.to_string())),
                    }
                }
            })
            .buffer_unordered(self.max_concurrency)
            .enumerate()
            .map(|(i, result)| {
                progress.scraped(i + 1, total, &result);
                result
            })
            .collect()
            .await;

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(
            total,
            succeeded = total - failed,
            failed,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Scraping finished"
        );
        results
    }
}

/// Concatenate results under a per-URL header, keeping their order.
pub fn assemble_block(results: &[ScrapeResult]) -> String {
    let mut block = String::new();
    for result in results {
        let _ = write!(
            block,
            "\n--- 链接 {} 的正文 ---\n{}\n",
            result.url,
            result.display_text()
        );
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = "<p>El Coordinador Eléctrico Nacional informó una nueva licitación de transmisión.</p>";

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<(usize, usize, String)>>,
    }

    impl ProgressSink for RecordingSink {
        fn scraped(&self, done: usize, total: usize, result: &ScrapeResult) {
            self.seen
                .lock()
                .unwrap()
                .push((done, total, result.url.clone()));
        }
    }

    fn scraper(timeout_secs: u64, max_concurrency: usize) -> Scraper {
        let config = AppConfig {
            fetch_timeout_secs: timeout_secs,
            max_concurrency,
            ..AppConfig::default()
        };
        Scraper::new(&config).unwrap()
    }

    async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_every_url_yields_one_result() {
        let server = MockServer::start().await;
        mount(&server, "/ok", ResponseTemplate::new(200).set_body_string(BODY)).await;

        let urls: Vec<String> = (0..25).map(|_| format!("{}/ok", server.uri())).collect();
        let sink = RecordingSink::default();
        let results = scraper(10, 10).scrape_all(&urls, &sink).await;

        assert_eq!(results.len(), 25);
        assert!(results.iter().all(ScrapeResult::is_ok));
        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 25);
        assert_eq!(
            seen.iter().map(|(done, _, _)| *done).collect::<Vec<_>>(),
            (1..=25).collect::<Vec<_>>()
        );
        assert!(seen.iter().all(|(_, total, _)| *total == 25));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let server = MockServer::start().await;
        mount(&server, "/good", ResponseTemplate::new(200).set_body_string(BODY)).await;
        mount(&server, "/broken", ResponseTemplate::new(500)).await;
        mount(
            &server,
            "/slow",
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(4))
                .set_body_string(BODY),
        )
        .await;

        let urls = vec![
            format!("{}/slow", server.uri()),
            format!("{}/broken", server.uri()),
            "http://127.0.0.1:9/refused".to_string(),
            format!("{}/good", server.uri()),
        ];
        let started = Instant::now();
        let results = scraper(1, 10).scrape_all(&urls, &LogProgress).await;
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(results.len(), 4);

        let by_url = |suffix: &str| {
            results
                .iter()
                .find(|r| r.url.ends_with(suffix))
                .expect("result for url")
                .clone()
        };
        assert!(by_url("/good").is_ok());
        assert!(by_url("/good").display_text().contains("Coordinador"));
        assert_eq!(by_url("/broken").outcome, Err(ScrapeError::HttpStatus(500)));
        assert!(matches!(by_url("/slow").outcome, Err(ScrapeError::Timeout(_))));
        assert!(matches!(by_url("/refused").outcome, Err(ScrapeError::Request(_))));
    }

    #[tokio::test]
    async fn test_results_follow_completion_order() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/late",
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(600))
                .set_body_string(BODY),
        )
        .await;
        mount(&server, "/early", ResponseTemplate::new(200).set_body_string(BODY)).await;

        let urls = vec![format!("{}/late", server.uri()), format!("{}/early", server.uri())];
        let results = scraper(10, 10).scrape_all(&urls, &LogProgress).await;
        assert!(results[0].url.ends_with("/early"));
        assert!(results[1].url.ends_with("/late"));
    }

    #[tokio::test]
    async fn test_concurrency_cap_of_one_serializes() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/late",
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_string(BODY),
        )
        .await;
        mount(&server, "/early", ResponseTemplate::new(200).set_body_string(BODY)).await;

        let urls = vec![format!("{}/late", server.uri()), format!("{}/early", server.uri())];
        let results = scraper(10, 1).scrape_all(&urls, &LogProgress).await;
        // With a single worker the first submitted job must finish first.
        assert!(results[0].url.ends_with("/late"));
        assert!(results[1].url.ends_with("/early"));
    }

    #[tokio::test]
    async fn test_empty_url_list() {
        let results = scraper(10, 10).scrape_all(&[], &LogProgress).await;
        assert!(results.is_empty());
    }

    struct PanicsOn(&'static str);

    #[async_trait]
    impl PageSource for PanicsOn {
        async fn scrape(&self, url: &str) -> ScrapeResult {
            if url.contains(self.0) {
                panic!("parser blew up on {url}");
            }
            ScrapeResult::ok(url, "texto")
        }
    }

    #[tokio::test]
    async fn test_panicking_job_becomes_worker_failure() {
        let scraper = Scraper::with_source(Arc::new(PanicsOn("boom")), 2);
        let urls = vec![
            "https://a.example/ok".to_string(),
            "https://b.example/boom".to_string(),
            "https://c.example/ok".to_string(),
        ];
        let sink = RecordingSink::default();
        let results = scraper.scrape_all(&urls, &sink).await;

        assert_eq!(results.len(), 3);
        assert_eq!(sink.seen.lock().unwrap().len(), 3);
        let broken = results
            .iter()
            .find(|r| r.url.ends_with("/boom"))
            .expect("result for panicking url");
        assert!(matches!(broken.outcome, Err(ScrapeError::Worker(_))));
        assert!(broken.display_text().starts_with("[抓取出错: worker failed:"));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    }

    #[test]
    fn test_assemble_block() {
        let results = vec![
            ScrapeResult::ok("https://a.example/x", "texto A"),
            ScrapeResult::failed("https://b.example/y", ScrapeError::HttpStatus(403)),
        ];
        assert_eq!(
            assemble_block(&results),
            "\n--- 链接 https://a.example/x 的正文 ---\ntexto A\n\
             \n--- 链接 https://b.example/y 的正文 ---\n[网页错误: 403]\n"
        );
    }

    #[test]
    fn test_assemble_block_empty() {
        assert_eq!(assemble_block(&[]), "");
    }
}
