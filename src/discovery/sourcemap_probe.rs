//! Source map probing - tries to find .map files even when not referenced.

use crate::discovery::Fetch;
use crate::types::Fetched;
use tracing::{debug, trace};
use url::Url;

/// Candidate map URLs for a script, most likely first.
pub fn sourcemap_variations(js_url: &Url) -> Vec<Url> {
    let mut base = js_url.clone();
    base.set_query(None);
    base.set_fragment(None);
    let js = base.as_str();

    let mut variations = vec![format!("{}.map", js)];

    // Try without .min if present
    if js.contains(".min.js") {
        variations.push(format!("{}.map", js.replace(".min.js", ".js")));
    }

    // Try adding .min if not present
    if js.ends_with(".js") && !js.contains(".min.") {
        if let Some(stem) = js.strip_suffix(".js") {
            variations.push(format!("{}.min.js.map", stem));
        }
    }

    // Try common sourcemap directories
    if let Some(filename) = js.rsplit('/').next().filter(|f| !f.is_empty()) {
        if let Some(dir) = js.strip_suffix(filename) {
            for sub in ["sourcemaps", "_sourcemaps", "maps"] {
                variations.push(format!("{}{}/{}.map", dir, sub, filename));
            }
        }
    }

    variations
        .into_iter()
        .filter_map(|v| Url::parse(&v).ok())
        .collect()
}

/// Try each candidate URL and return the first response that looks like a
/// source map.
pub async fn probe<F: Fetch>(fetcher: &F, js_url: &Url) -> Option<Fetched> {
    for map_url in sourcemap_variations(js_url) {
        trace!("Probing source map: {}", map_url);
        match fetcher.fetch(&map_url).await {
            Ok(fetched) if is_valid_sourcemap(&fetched.body) => {
                debug!("Found unreferenced source map at {}", map_url);
                return Some(fetched);
            }
            Ok(_) => trace!("Not a source map: {}", map_url),
            Err(e) => trace!("Probe miss {}: {}", map_url, e),
        }
    }

    None
}

/// Check if content looks like a valid source map.
pub fn is_valid_sourcemap(content: &str) -> bool {
    let trimmed = content.trim_start();
    let trimmed = trimmed
        .strip_prefix(")]}'")
        .map(str::trim_start)
        .unwrap_or(trimmed);

    if !trimmed.starts_with('{') {
        return false;
    }

    // Must have "version" field
    if !content.contains("\"version\"") {
        return false;
    }

    // Should have either "sources" or "mappings"
    content.contains("\"sources\"") || content.contains("\"mappings\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::fetcher::testing::StaticFetcher;

    #[test]
    fn test_is_valid_sourcemap() {
        let valid = r#"{"version":3,"sources":["src/main.js"],"mappings":"AAAA"}"#;
        assert!(is_valid_sourcemap(valid));

        let guarded = ")]}'\n{\"version\":3,\"sources\":[]}";
        assert!(is_valid_sourcemap(guarded));

        let invalid = r#"{"name":"not a sourcemap"}"#;
        assert!(!is_valid_sourcemap(invalid));

        let html = "<!DOCTYPE html>";
        assert!(!is_valid_sourcemap(html));
    }

    #[test]
    fn test_variations() {
        let url = Url::parse("https://example.com/js/app.min.js?v=3").unwrap();
        let variations: Vec<String> = sourcemap_variations(&url)
            .into_iter()
            .map(|u| u.to_string())
            .collect();

        assert_eq!(variations[0], "https://example.com/js/app.min.js.map");
        assert!(variations.contains(&"https://example.com/js/app.js.map".to_string()));
        assert!(variations.contains(&"https://example.com/js/sourcemaps/app.min.js.map".to_string()));
        assert!(variations.contains(&"https://example.com/js/maps/app.min.js.map".to_string()));
    }

    #[test]
    fn test_variations_adds_min() {
        let url = Url::parse("https://example.com/app.js").unwrap();
        let variations: Vec<String> = sourcemap_variations(&url)
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        assert!(variations.contains(&"https://example.com/app.min.js.map".to_string()));
    }

    #[tokio::test]
    async fn test_probe_finds_sibling_directory() {
        let map = r#"{"version":3,"sources":["a.js"],"mappings":""}"#;
        let fetcher = StaticFetcher::new()
            .with("https://example.com/app.js.map", "<html>not found page</html>")
            .with("https://example.com/maps/app.js.map", map);

        let url = Url::parse("https://example.com/app.js").unwrap();
        let found = probe(&fetcher, &url).await.unwrap();
        assert_eq!(found.final_url.as_str(), "https://example.com/maps/app.js.map");
        assert_eq!(found.body, map);
    }

    #[tokio::test]
    async fn test_probe_miss() {
        let fetcher = StaticFetcher::new();
        let url = Url::parse("https://example.com/app.js").unwrap();
        assert!(probe(&fetcher, &url).await.is_none());
    }
}
