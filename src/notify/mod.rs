//! Terminal output for extraction progress and results.

pub mod console;

pub use console::ConsoleOutput;
