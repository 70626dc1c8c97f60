//! Core types and errors for source recovery.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Errors that can occur while recovering sources.
#[derive(Error, Debug)]
pub enum GrabError {
    #[error("request to {url} failed: {reason}")]
    Network {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("malformed source map: {0}")]
    MalformedMap(String),

    #[error("refusing to write {path:?}: {reason}")]
    PathSanitization { path: String, reason: &'static str },

    #[error("URL parse error: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GrabError {
    /// Whether retrying the request that produced this error could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // 4xx won't change on retry
            GrabError::Network {
                status: Some(code), ..
            } => !(400..500).contains(code),
            GrabError::Network { status: None, .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GrabError>;

/// A successfully fetched resource.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Response body decoded as text.
    pub body: String,
    /// URL after following redirects.
    pub final_url: Url,
    /// Value of a `SourceMap` or `X-SourceMap` response header.
    pub source_map_header: Option<String>,
}

/// A `<script>` element found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReference {
    /// Script URL, or the page URL for inline scripts.
    pub url: Url,
    pub is_inline: bool,
    /// Inline script body; `None` for external scripts.
    pub body: Option<String>,
}

impl ScriptReference {
    pub fn external(url: Url) -> Self {
        Self {
            url,
            is_inline: false,
            body: None,
        }
    }

    pub fn inline(page_url: Url, body: String) -> Self {
        Self {
            url: page_url,
            is_inline: true,
            body: Some(body),
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        if self.is_inline {
            format!("inline script on {}", self.url)
        } else {
            self.url.to_string()
        }
    }
}

/// Where a script's source map lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMapDescriptor {
    /// A map to download.
    External(Url),
    /// A map embedded in a `data:` URL, already decoded.
    Inline(Vec<u8>),
}

/// The parts of a source map needed to rebuild files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSourceMap {
    /// Source names in map order.
    pub sources: Vec<String>,
    /// Embedded contents, same length as `sources`.
    pub sources_content: Vec<Option<String>>,
    /// The map's `sourceRoot`, if any.
    pub source_root: Option<String>,
}

impl ParsedSourceMap {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source name at `index` with `sourceRoot` prepended.
    pub fn qualified_source(&self, index: usize) -> Option<String> {
        let source = self.sources.get(index)?;
        match self.source_root.as_deref() {
            Some(root) if !root.is_empty() && !is_absolute_reference(source) => {
                if root.ends_with('/') {
                    Some(format!("{}{}", root, source))
                } else {
                    Some(format!("{}/{}", root, source))
                }
            }
            _ => Some(source.clone()),
        }
    }

    /// Iterate `(qualified source, content)` pairs in map order.
    pub fn entries(&self) -> impl Iterator<Item = (String, Option<&str>)> + '_ {
        (0..self.len()).filter_map(move |i| {
            let source = self.qualified_source(i)?;
            Some((source, self.sources_content[i].as_deref()))
        })
    }
}

fn is_absolute_reference(source: &str) -> bool {
    source.starts_with('/') || source.contains("://")
}

/// A source file ready to be written under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredFile {
    /// Sanitized path relative to the output root.
    pub relative_path: PathBuf,
    pub content: String,
    /// Source name as listed in the map.
    pub source: String,
}

/// A file written during the run.
#[derive(Debug, Clone, Serialize)]
pub struct WrittenFile {
    pub path: String,
    pub source: String,
    /// Map URL, or `inline:<script>` for embedded maps.
    pub map: String,
    pub bytes: usize,
    pub sha256: String,
}

/// Summary of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub target: String,
    pub page_url: String,
    pub output_dir: String,
    pub scripts_found: usize,
    pub maps_processed: usize,
    pub files: Vec<WrittenFile>,
    /// Sources whose content could not be obtained.
    pub unresolved: Vec<String>,
    /// Sources whose path would escape the output directory.
    pub rejected: Vec<String>,
    /// Recoverable errors encountered during the run.
    pub errors: Vec<String>,
    pub duration_secs: f64,
}

/// Configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_retries: 2,
            user_agent: "Mozilla/5.0 (compatible; sourcegrab/0.1)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let not_found = GrabError::Network {
            url: "https://example.com/a.js".to_string(),
            status: Some(404),
            reason: "404 Not Found".to_string(),
        };
        assert!(!not_found.is_retryable());

        let server = GrabError::Network {
            url: "https://example.com/a.js".to_string(),
            status: Some(503),
            reason: "503 Service Unavailable".to_string(),
        };
        assert!(server.is_retryable());

        let timeout = GrabError::Network {
            url: "https://example.com/a.js".to_string(),
            status: None,
            reason: "timed out".to_string(),
        };
        assert!(timeout.is_retryable());

        assert!(!GrabError::MalformedMap("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_qualified_source_with_root() {
        let map = ParsedSourceMap {
            sources: vec!["a.js".to_string(), "https://cdn.example.com/b.js".to_string()],
            sources_content: vec![None, None],
            source_root: Some("src".to_string()),
        };
        assert_eq!(map.qualified_source(0).as_deref(), Some("src/a.js"));
        assert_eq!(
            map.qualified_source(1).as_deref(),
            Some("https://cdn.example.com/b.js")
        );
        assert_eq!(map.qualified_source(2), None);
    }

    #[test]
    fn test_qualified_source_without_root() {
        let map = ParsedSourceMap {
            sources: vec!["lib/x.js".to_string()],
            sources_content: vec![Some("x".to_string())],
            source_root: Some(String::new()),
        };
        let entries: Vec<_> = map.entries().collect();
        assert_eq!(entries, vec![("lib/x.js".to_string(), Some("x"))]);
    }
}
