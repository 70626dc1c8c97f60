//! Writing recovered sources into the output directory.

use crate::types::{GrabError, RecoveredFile, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Turn a source name from a map into a path that stays inside the output root.
///
/// Strips URL schemes (`webpack:///`, `file:///`), query strings and
/// fragments, percent-decodes, and collapses `.`/`..` segments. A `..` that
/// would climb above the root is rejected.
pub fn sanitize_relative_path(raw: &str) -> Result<PathBuf> {
    let reject = |reason| GrabError::PathSanitization {
        path: raw.to_string(),
        reason,
    };

    let without_scheme = strip_scheme(raw);
    let without_query = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let decoded = urlencoding::decode(without_query)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| without_query.to_string());

    let mut parts: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(reject("path escapes the output directory"));
                }
            }
            s if s.contains('\0') => return Err(reject("path contains a NUL byte")),
            s => parts.push(s),
        }
    }

    if parts.is_empty() {
        return Err(reject("path is empty after sanitization"));
    }

    Ok(parts.iter().collect())
}

/// Drop a leading `scheme:` and the slashes after it.
fn strip_scheme(raw: &str) -> &str {
    let rest = match raw.split_once(':') {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            rest
        }
        _ => raw,
    };
    rest.trim_start_matches(['/', '\\'])
}

#[cfg(test)]
impl RecoveredFile {
    /// Build a file for `source`, sanitizing its path.
    pub(crate) fn new(source: &str, content: String) -> Result<Self> {
        Ok(Self {
            relative_path: sanitize_relative_path(source)?,
            content,
            source: source.to_string(),
        })
    }
}

/// Calculate SHA256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Writes recovered files under a root directory, recreating subdirectories.
pub struct TreeWriter {
    root: PathBuf,
    /// Hashes of files written during this run, keyed by relative path.
    written: HashMap<PathBuf, String>,
}

impl TreeWriter {
    /// Create a writer, creating `root` if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            written: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one file, overwriting whatever is there. Returns the content hash.
    ///
    /// When the same path was already written in this run with different
    /// content, the new content wins and a warning is logged.
    pub fn write(&mut self, file: &RecoveredFile) -> Result<String> {
        let relative = &file.relative_path;
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(GrabError::PathSanitization {
                path: relative.display().to_string(),
                reason: "path is not a plain relative path",
            });
        }

        let full = self.root.join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, file.content.as_bytes())?;

        let hash = hash_content(&file.content);
        match self.written.insert(relative.clone(), hash.clone()) {
            Some(previous) if previous != hash => warn!(
                "{} was recovered more than once with different content; keeping the copy from {}",
                relative.display(),
                file.source
            ),
            _ => debug!("Wrote {} ({} bytes)", full.display(), file.content.len()),
        }

        Ok(hash)
    }

    /// Number of distinct paths written so far.
    pub fn files_written(&self) -> usize {
        self.written.len()
    }
}
