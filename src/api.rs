//! LLM API interaction.
//!
//! The rest of the crate talks to the model through [`AskAsync`], so the
//! hosted service can be swapped for a stub in tests.
//!
//! - [`AskAsync`]: one prompt in, one markdown string out
//! - [`GeminiClient`]: Gemini `generateContent` over REST
//!
//! There is no retry tier. A failed call is reported once and the caller
//! degrades to a placeholder report.

use crate::config::{AppConfig, ConfigError};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Why a generation call produced no report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty response{}", .0.as_ref().map(|r| format!(" (finish reason {r})")).unwrap_or_default())]
    Empty(Option<String>),
}

/// Trait for async LLM interaction.
#[async_trait]
pub trait AskAsync: Send + Sync {
    /// Send `text` to the model and return its markdown reply.
    async fn ask(&self, text: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.llm_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = config
            .apply_proxy(builder)?
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        let endpoint = Url::parse(&config.llm_endpoint)
            .map_err(|e| ConfigError::Invalid(format!("llm_endpoint: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// `{endpoint}/v1beta/models/{model}:generateContent`
    fn request_url(&self) -> Result<Url, LlmError> {
        let path = format!(
            "v1beta/models/{}:generateContent",
            urlencoding::encode(&self.model)
        );
        let mut base = self.endpoint.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(&path)
            .map_err(|e| LlmError::Transport(format!("invalid request url: {e}")))
    }
}

/// The key travels in a header, and the url is stripped from transport
/// errors, so neither can end up in a report or a log line.
fn map_transport_error(err: reqwest::Error) -> LlmError {
    let err = err.without_url();
    if err.is_timeout() {
        LlmError::Timeout(err.to_string())
    } else {
        LlmError::Transport(err.to_string())
    }
}

#[async_trait]
impl AskAsync for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model, prompt_chars = text.chars().count()))]
    async fn ask(&self, text: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let url = self.request_url()?;
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text }],
            }],
        };

        let t0 = Instant::now();
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(map_transport_error)?;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| truncate_for_log(&raw, 300));
            warn!(elapsed_ms, status = status.as_u16(), %message, "API call failed");
            return Err(LlmError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply = parse_reply(&raw)?;
        info!(elapsed_ms, reply_chars = reply.chars().count(), "API call succeeded");
        Ok(reply)
    }
}

/// Concatenated text parts of the first candidate.
fn parse_reply(raw: &str) -> Result<String, LlmError> {
    let parsed: GenerateResponse = serde_json::from_str(raw)
        .map_err(|e| LlmError::Malformed(format!("{e}: {}", truncate_for_log(raw, 200))))?;
    let candidate = parsed.candidates.into_iter().next().ok_or(LlmError::Empty(None))?;
    let text = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).join(""))
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(LlmError::Empty(candidate.finish_reason));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, api_key: Option<&str>) -> GeminiClient {
        let config = AppConfig {
            llm_endpoint: server.uri(),
            api_key: api_key.map(str::to_string),
            model: "gemini-flash-latest".to_string(),
            ..AppConfig::default()
        };
        GeminiClient::new(&config).unwrap()
    }

    #[test]
    fn test_parse_reply_joins_parts() {
        let raw = json!({
            "candidates": [{
                "content": {"parts": [{"text": "### 🍊 标题\n"}, {"text": "摘要"}]},
                "finishReason": "STOP"
            }]
        })
        .to_string();
        assert_eq!(parse_reply(&raw).unwrap(), "### 🍊 标题\n摘要");
    }

    #[test]
    fn test_parse_reply_without_candidates() {
        assert_eq!(parse_reply("{}"), Err(LlmError::Empty(None)));
    }

    #[test]
    fn test_parse_reply_blocked_candidate() {
        let raw = json!({"candidates": [{"finishReason": "SAFETY"}]}).to_string();
        let err = parse_reply(&raw).unwrap_err();
        assert_eq!(err, LlmError::Empty(Some("SAFETY".to_string())));
        assert_eq!(err.to_string(), "empty response (finish reason SAFETY)");
    }

    #[test]
    fn test_parse_reply_malformed() {
        assert!(matches!(parse_reply("not json"), Err(LlmError::Malformed(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = AppConfig {
            api_key: Some("secret-key".into()),
            ..AppConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_ask_posts_prompt_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-flash-latest:generateContent"))
            .and(header(API_KEY_HEADER, "k-123"))
            .and(body_partial_json(json!({"contents": [{"parts": [{"text": "hola"}]}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "### 🍊 报告"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k-123"));
        assert_eq!(client.ask("hola").await.unwrap(), "### 🍊 报告");
    }

    #[tokio::test]
    async fn test_ask_surfaces_service_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        let err = client.ask("hola").await.unwrap_err();
        assert_eq!(
            err,
            LlmError::Status {
                status: 429,
                message: "Resource has been exhausted".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_ask_without_key_never_calls_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert_eq!(client.ask("hola").await, Err(LlmError::MissingApiKey));
    }

    #[test]
    fn test_request_url_keeps_endpoint_prefix() {
        let config = AppConfig {
            llm_endpoint: "http://proxy.local/gemini".to_string(),
            ..AppConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        let url = client.request_url().unwrap();
        assert_eq!(
            url.as_str(),
            "http://proxy.local/gemini/v1beta/models/gemini-flash-latest:generateContent"
        );
    }

    #[tokio::test]
    async fn test_key_stays_out_of_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server, Some("SECRET-KEY-123")).ask("hola").await.unwrap();
        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].url.as_str().contains("SECRET-KEY-123"));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        let config = AppConfig {
            llm_endpoint: "http://127.0.0.1:9".to_string(),
            api_key: Some("SECRET-KEY-123".to_string()),
            ..AppConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        let err = client.ask("hola").await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
    }
}
