//! Command-line interface definitions for news_brief.
//!
//! Global flags override values from the optional YAML config file. Secrets and
//! the proxy can also come from the environment.

use crate::config::ConfigOverrides;
use crate::models::LanguageMode;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command-line arguments for news_brief.
///
/// # Examples
///
/// ```sh
/// # Build a report from a saved chat export
/// news_brief generate --input messages.txt --mode bilingual --output-dir ./reports
///
/// # Read from stdin through a local proxy
/// pbpaste | news_brief --proxy http://127.0.0.1:7897 generate --input -
///
/// # Browser front end
/// news_brief serve --bind 0.0.0.0:8501
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "NEWS_BRIEF_MODEL", global = true)]
    pub model: Option<String>,

    /// Proxy URL used for page fetches and the model call
    #[arg(long, env = "NEWS_BRIEF_PROXY", global = true)]
    pub proxy: Option<String>,

    /// Organization named in the prompt, footer and filenames
    #[arg(long, global = true)]
    pub organization: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a report once and write it to disk
    Generate {
        /// File with the pasted messages, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Language layout of the report
        #[arg(long, value_enum, default_value_t = LanguageMode::SourceGlossary)]
        mode: LanguageMode,

        /// Directory for the .md, .html and .docx files
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Serve the browser form
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8501")]
        bind: SocketAddr,
    },
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            proxy: self.proxy.clone(),
            organization: self.organization.clone(),
        }
    }
}
