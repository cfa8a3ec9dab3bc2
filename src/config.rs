//! Runtime configuration.
//!
//! One [`AppConfig`] is built in `main` from an optional YAML file plus CLI
//! overrides, then handed to the scraper and the LLM client. Nothing reads
//! configuration from globals after that point.
//!
//! ```yaml
//! api_key: "..."
//! model: gemini-flash-latest
//! proxy: http://127.0.0.1:7897
//! organization: Chilquinta
//! max_concurrency: 10
//! ```

use crate::models::Branding;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid proxy url {0}: {1}")]
    Proxy(String, String),
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Gemini API key. A missing key only fails the generation step.
    pub api_key: Option<String>,
    pub model: String,
    pub llm_endpoint: String,
    /// Unset means no client-side limit on the generation call.
    pub llm_timeout_secs: Option<u64>,
    /// Applied to both page fetches and the LLM call.
    pub proxy: Option<String>,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    pub max_concurrency: usize,
    pub max_chars_per_page: usize,
    pub min_paragraph_chars: usize,
    pub organization: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-flash-latest".to_string(),
            llm_endpoint: "https://generativelanguage.googleapis.com".to_string(),
            llm_timeout_secs: None,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: 10,
            max_concurrency: 10,
            max_chars_per_page: 2500,
            min_paragraph_chars: 50,
            organization: "Chilquinta".to_string(),
        }
    }
}

/// Values given on the command line; `None` keeps the file or default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub proxy: Option<String>,
    pub organization: Option<String>,
}

impl AppConfig {
    /// Load from `path` if given, apply overrides, then validate.
    #[instrument(level = "info", skip(overrides))]
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                let parsed = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
                info!(path = %path.display(), "Loaded configuration file");
                parsed
            }
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        debug!(
            model = %config.model,
            has_api_key = config.api_key.is_some(),
            proxy = ?config.proxy,
            max_concurrency = config.max_concurrency,
            "Effective configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(key) = overrides.api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(proxy) = overrides.proxy {
            self.proxy = Some(proxy);
        }
        if let Some(org) = overrides.organization {
            self.organization = org;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_secs must be at least 1".into()));
        }
        if self.max_chars_per_page == 0 {
            return Err(ConfigError::Invalid("max_chars_per_page must be at least 1".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        url::Url::parse(&self.llm_endpoint)
            .map_err(|e| ConfigError::Invalid(format!("llm_endpoint: {e}")))?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn branding(&self) -> Branding {
        Branding::new(self.organization.clone())
    }

    /// Apply the configured proxy, or switch off reqwest's environment lookup.
    pub fn apply_proxy(
        &self,
        builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, ConfigError> {
        match &self.proxy {
            Some(proxy) => {
                let proxy = reqwest::Proxy::all(proxy)
                    .map_err(|e| ConfigError::Proxy(proxy.clone(), e.to_string()))?;
                Ok(builder.proxy(proxy))
            }
            None => Ok(builder.no_proxy()),
        }
    }
}
