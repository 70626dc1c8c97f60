//! Source map parser producing the `sources` / `sourcesContent` pairs.
//!
//! Only the fields needed to rebuild files are read; `mappings` is never
//! decoded.

use crate::types::{GrabError, ParsedSourceMap, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// Guard some servers put in front of JSON responses.
const XSSI_PREFIX: &[u8] = b")]}'";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    #[serde(default)]
    version: Option<serde_json::Value>,
    #[serde(default)]
    sources: Option<Vec<String>>,
    #[serde(default)]
    sources_content: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sections: Option<Vec<RawSection>>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(default)]
    map: Option<Box<RawSourceMap>>,
    #[serde(default)]
    url: Option<String>,
}

/// Parse source map bytes.
///
/// Index maps (`sections`) are flattened in section order. Fails with
/// [`GrabError::MalformedMap`] when the payload is not JSON or has no
/// `sources` array.
pub fn parse_source_map(bytes: &[u8]) -> Result<ParsedSourceMap> {
    let raw: RawSourceMap = serde_json::from_slice(strip_xssi_prefix(bytes))
        .map_err(|e| GrabError::MalformedMap(e.to_string()))?;

    if let Some(version) = raw.version.as_ref().filter(|v| v.as_u64() != Some(3)) {
        debug!("Source map declares version {}, parsing anyway", version);
    }

    from_raw(raw)
}

fn from_raw(raw: RawSourceMap) -> Result<ParsedSourceMap> {
    if let Some(sections) = raw.sections {
        let mut merged = ParsedSourceMap::default();
        for (i, section) in sections.into_iter().enumerate() {
            let Some(map) = section.map else {
                warn!(
                    "Skipping section {} of index map: referenced map {:?} is not embedded",
                    i, section.url
                );
                continue;
            };

            // Each section has its own sourceRoot, so fold it into the names
            let inner = match from_raw(*map) {
                Ok(inner) => inner,
                Err(e) => {
                    warn!("Skipping section {} of index map: {}", i, e);
                    continue;
                }
            };
            for (source, content) in inner.entries() {
                merged.sources.push(source);
                merged.sources_content.push(content.map(str::to_string));
            }
        }
        return Ok(merged);
    }

    let sources = raw
        .sources
        .ok_or_else(|| GrabError::MalformedMap("missing \"sources\" array".to_string()))?;

    Ok(ParsedSourceMap {
        sources_content: align_contents(raw.sources_content, sources.len()),
        sources,
        source_root: raw.source_root,
    })
}

/// Pad or truncate `sourcesContent` so it lines up with `sources`.
///
/// Entries that are not strings count as missing.
fn align_contents(contents: Option<Vec<serde_json::Value>>, len: usize) -> Vec<Option<String>> {
    let mut contents: Vec<Option<String>> = match contents {
        Some(c) => c
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => {
                    debug!("sourcesContent[{}] is not a string ({}), ignoring it", i, other);
                    None
                }
            })
            .collect(),
        None => return vec![None; len],
    };

    if contents.len() != len {
        warn!(
            "sourcesContent has {} entries for {} sources; aligning by position",
            contents.len(),
            len
        );
        contents.resize(len, None);
    }

    contents
}

fn strip_xssi_prefix(bytes: &[u8]) -> &[u8] {
    let trimmed = trim_ascii_start(bytes);
    match trimmed.strip_prefix(XSSI_PREFIX) {
        Some(rest) => rest,
        None => bytes,
    }
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}
