//! Configuration handling for the extractor.

use crate::extractor::ExtractOptions;
use crate::resolver::ResolveOptions;
use crate::types::{GrabError, HttpConfig, Result};
use clap::Parser;
use std::path::PathBuf;
use url::Url;

/// Recover original source trees from a page's JavaScript source maps.
#[derive(Parser, Debug, Clone)]
#[command(name = "sourcegrab")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Page URL to extract sources from
    pub target: String,

    /// Directory to write recovered sources into
    #[arg(default_value = "recovered")]
    pub output_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode: only print the summary
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value = "20")]
    pub timeout: u64,

    /// Maximum retries for failed requests
    #[arg(long, default_value = "2")]
    pub max_retries: u32,

    /// Rate limit (requests per second)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    /// Number of scripts processed concurrently
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: u32,

    /// Custom User-Agent string
    #[arg(long, env = "SOURCEGRAB_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Write empty files for sources whose content could not be recovered
    #[arg(long)]
    pub placeholders: bool,

    /// Never download sources that have no embedded content
    #[arg(long)]
    pub no_fetch_missing: bool,

    /// Guess source map URLs for scripts without a sourceMappingURL comment
    #[arg(long)]
    pub probe: bool,
}

impl Config {
    /// Get HTTP configuration from the command line.
    pub fn http_config(&self) -> HttpConfig {
        let defaults = HttpConfig::default();
        HttpConfig {
            timeout_secs: self.timeout,
            max_retries: self.max_retries,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    /// Policy for sources without embedded content.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            fetch_missing: !self.no_fetch_missing,
            placeholders: self.placeholders,
        }
    }

    /// Options for the extraction pipeline.
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            resolve: self.resolve_options(),
            probe: self.probe,
            concurrency: self.concurrency as usize,
        }
    }

    /// Parse the target, defaulting to https when no scheme is given.
    pub fn target_url(&self) -> Result<Url> {
        normalize_target(&self.target)
    }
}

/// Normalize a target string into an absolute http(s) URL.
pub fn normalize_target(target: &str) -> Result<Url> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(GrabError::Config("target URL is empty".to_string()));
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)?;
    if url.host_str().is_none() {
        return Err(GrabError::Config(format!("target has no host: {}", target)));
    }
    Ok(url)
}
