//! Script and source map discovery.
//!
//! This module handles:
//! - Fetching pages, scripts and maps over HTTP
//! - Finding `<script>` elements in HTML
//! - Locating source maps from `sourceMappingURL` directives
//! - Probing for maps that are not referenced

pub mod fetcher;
pub mod map_locator;
pub mod page_scanner;
pub mod sourcemap_probe;

pub use fetcher::{Fetch, Fetcher};
pub use map_locator::{find_directive, locate_source_map};
pub use page_scanner::scan_scripts;
