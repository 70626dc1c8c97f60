//! Script discovery in HTML pages.

use crate::types::ScriptReference;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Extract every `<script>` element from `html` in document order.
///
/// External scripts are resolved against the document base (`<base href>`
/// when present, otherwise `page_url`). Inline scripts carry their body and
/// the page URL.
pub fn scan_scripts(html: &str, page_url: &Url) -> Vec<ScriptReference> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let selector = match Selector::parse("script") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut scripts = Vec::new();
    for element in document.select(&selector) {
        match element.value().attr("src") {
            Some(src) => match base.join(src.trim()) {
                Ok(url) => scripts.push(ScriptReference::external(url)),
                Err(e) => warn!("Skipping script with unresolvable src {:?}: {}", src, e),
            },
            None => {
                let body: String = element.text().collect();
                scripts.push(ScriptReference::inline(page_url.clone(), body));
            }
        }
    }

    debug!(
        "Found {} scripts ({} inline) on {}",
        scripts.len(),
        scripts.iter().filter(|s| s.is_inline).count(),
        page_url
    );

    scripts
}

/// Base URL for relative references in the document.
fn document_base(document: &Html, page_url: &Url) -> Url {
    let selector = match Selector::parse("base[href]") {
        Ok(s) => s,
        Err(_) => return page_url.clone(),
    };

    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}
