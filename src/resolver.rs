//! Turning parsed source map entries into files, fetching missing content.

use crate::discovery::Fetch;
use crate::types::{ParsedSourceMap, RecoveredFile};
use crate::writer::sanitize_relative_path;
use tracing::{debug, warn};
use url::Url;

/// What to do with sources that have no embedded content.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Try to download the original file.
    pub fetch_missing: bool,
    /// Write an empty file when the content stays unavailable.
    pub placeholders: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fetch_missing: true,
            placeholders: false,
        }
    }
}

/// Outcome of resolving one source map.
#[derive(Debug, Default)]
pub struct ResolvedSources {
    /// Files to write, in map order.
    pub files: Vec<RecoveredFile>,
    /// Sources with no content available.
    pub unresolved: Vec<String>,
    /// Sources whose path was refused by sanitization.
    pub rejected: Vec<String>,
}

/// Build files for every entry of `map`.
///
/// Missing contents are fetched relative to `base` (the map URL, or the
/// script URL for inline maps). Failures never abort; they are recorded in
/// the result.
pub async fn resolve_sources<F: Fetch>(
    fetcher: &F,
    map: &ParsedSourceMap,
    base: &Url,
    options: &ResolveOptions,
) -> ResolvedSources {
    let mut resolved = ResolvedSources::default();

    for (source, content) in map.entries() {
        let relative_path = match sanitize_relative_path(&source) {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping source: {}", e);
                resolved.rejected.push(source);
                continue;
            }
        };

        let content = match content {
            Some(c) => Some(c.to_string()),
            None if options.fetch_missing => fetch_original(fetcher, &source, base).await,
            None => None,
        };

        match content {
            Some(content) => resolved.files.push(RecoveredFile {
                relative_path,
                content,
                source,
            }),
            None => {
                if options.placeholders {
                    resolved.files.push(RecoveredFile {
                        relative_path,
                        content: String::new(),
                        source: source.clone(),
                    });
                }
                resolved.unresolved.push(source);
            }
        }
    }

    resolved
}

/// Best-effort download of a source that the map did not embed.
async fn fetch_original<F: Fetch>(fetcher: &F, source: &str, base: &Url) -> Option<String> {
    let url = match base.join(source) {
        Ok(u) => u,
        Err(e) => {
            debug!("Cannot resolve source {:?} against {}: {}", source, base, e);
            return None;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        debug!("Not fetching {}: unsupported scheme", url);
        return None;
    }

    match fetcher.fetch(&url).await {
        Ok(fetched) if !fetched.body.trim().is_empty() => Some(fetched.body),
        Ok(_) => {
            warn!("Original source {} is empty", url);
            None
        }
        Err(e) => {
            warn!("Could not fetch original source: {}", e);
            None
        }
    }
}
