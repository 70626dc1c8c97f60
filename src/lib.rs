//! sourcegrab - recover original source trees from a web page's source maps.
//!
//! This library provides the pieces of the extraction pipeline:
//! - Fetching the page and discovering its `<script>` elements
//! - Locating each script's source map (external `.map` or inline `data:` URL)
//! - Parsing `sources` / `sourcesContent` from the map
//! - Fetching sources the map does not embed
//! - Writing everything under an output directory without escaping it
//!
//! # Example
//!
//! ```no_run
//! use sourcegrab::{Config, Extractor};
//! use clap::Parser;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::parse_from(["sourcegrab", "https://example.com"]);
//!     let extractor = Extractor::new(&config).unwrap();
//!     let target = config.target_url().unwrap();
//!     let report = extractor.extract(&target, Path::new("recovered")).await.unwrap();
//!     println!("Recovered {} files", report.files.len());
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod extractor;
pub mod notify;
pub mod parser;
pub mod resolver;
pub mod types;
pub mod writer;

pub use config::Config;
pub use extractor::{ExtractOptions, Extractor};
pub use types::{
    ExtractionReport, Fetched, GrabError, ParsedSourceMap, RecoveredFile, Result,
    ScriptReference, SourceMapDescriptor, WrittenFile,
};
