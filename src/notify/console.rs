//! Colored console output for extraction runs.

use crate::types::ExtractionReport;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    verbose: bool,
    json_mode: bool,
    quiet: bool,
}

impl ConsoleOutput {
    /// Create a new console output handler.
    pub fn new(verbose: bool, json_mode: bool, quiet: bool) -> Self {
        Self {
            verbose,
            json_mode,
            quiet,
        }
    }

    /// Print run start message.
    pub fn print_scan_start(&self, target: &str, output_dir: &str) {
        if self.json_mode || self.quiet {
            return;
        }

        println!(
            "{} Extracting sources from: {} -> {}",
            "[*]".bright_blue(),
            target.bright_white(),
            output_dir.bright_white()
        );
    }

    /// Print progress (only in verbose mode).
    pub fn print_progress(&self, message: &str) {
        if self.json_mode || !self.verbose {
            return;
        }

        println!("{} {}", "[.]".dimmed(), message.dimmed());
    }

    /// Print info message.
    pub fn print_info(&self, message: &str) {
        if self.json_mode || self.quiet {
            return;
        }

        println!("{} {}", "[*]".bright_blue(), message);
    }

    /// Print a saved file.
    pub fn print_saved(&self, path: &str, bytes: usize) {
        if self.json_mode || self.quiet {
            return;
        }

        println!("{} {} {}", "[+]".green(), path, format!("({} bytes)", bytes).dimmed());
    }

    /// Print run summary.
    pub fn print_summary(&self, report: &ExtractionReport) {
        if self.json_mode {
            if let Ok(json) = serde_json::to_string_pretty(report) {
                println!("{}", json);
            }
            return;
        }

        println!();
        println!("{}", "=== Extraction Summary ===".bright_cyan());
        println!("  Target:      {}", report.page_url);
        println!("  Output:      {}", report.output_dir);
        println!("  Duration:    {:.2}s", report.duration_secs);
        println!("  Scripts:     {}", report.scripts_found);
        println!("  Source maps: {}", report.maps_processed);

        if report.files.is_empty() {
            println!("  {}", "No source files recovered.".yellow());
        } else {
            println!(
                "  {}",
                format!("Recovered files: {}", report.files.len()).green().bold()
            );
        }

        if !report.unresolved.is_empty() {
            println!(
                "  {}",
                format!("Unresolved sources: {}", report.unresolved.len()).yellow()
            );
            if self.verbose {
                for source in &report.unresolved {
                    println!("    - {}", source.dimmed());
                }
            }
        }

        if !report.rejected.is_empty() {
            println!(
                "  {}",
                format!("Rejected paths: {}", report.rejected.len()).red()
            );
            for source in &report.rejected {
                println!("    - {}", source.dimmed());
            }
        }

        if !report.errors.is_empty() && !self.quiet {
            println!();
            println!("{}", "Errors encountered:".yellow());
            for error in &report.errors {
                println!("  - {}", error.dimmed());
            }
        }

        println!();
    }

    /// Create a progress bar.
    pub fn create_progress_bar(&self, total: u64, message: &str) -> Option<ProgressBar> {
        if self.json_mode || self.quiet {
            return None;
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .ok()?
            .progress_chars("#>-");

        let pb = ProgressBar::new(total);
        pb.set_style(style);
        pb.set_message(message.to_string());
        Some(pb)
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false, false, false)
    }
}
