//! Source map parsing.
//!
//! Turns raw map bytes into the ordered list of source names and their
//! embedded contents.

pub mod sourcemap;

pub use sourcemap::parse_source_map;
