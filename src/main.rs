//! sourcegrab - recover original source trees from a web page's source maps.
//!
//! CLI entry point.

use clap::Parser;
use sourcegrab::{Config, Extractor};
use std::fs;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Set up logging
    let filter = if config.verbose {
        EnvFilter::new("sourcegrab=debug,info")
    } else {
        EnvFilter::new("sourcegrab=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}

async fn run(config: &Config) -> Result<(), ExitCode> {
    let target = match config.target_url() {
        Ok(t) => t,
        Err(e) => {
            error!("Invalid target: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let extractor = match Extractor::new(config) {
        Ok(x) => x,
        Err(e) => {
            error!("Failed to create extractor: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    if !config.json && !config.quiet {
        print_banner();
    }

    let report = match extractor.extract(&target, &config.output_dir).await {
        Ok(r) => r,
        Err(e) => {
            error!("Extraction failed: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    sourcegrab::notify::ConsoleOutput::new(config.verbose, config.json, config.quiet)
        .print_summary(&report);

    if let Some(ref report_path) = config.report {
        let json = serde_json::to_string_pretty(&report).unwrap_or_default();
        if let Err(e) = fs::write(report_path, &json) {
            error!("Failed to write report file: {}", e);
            return Err(ExitCode::FAILURE);
        }
        info!("Report written to: {:?}", report_path);
    }

    Ok(())
}

fn print_banner() {
    println!();
    println!("\x1b[36m╔══════════════════════════════════════════════════════════════╗\x1b[0m");
    println!("\x1b[36m║                    SOURCEGRAB v0.1.0                         ║\x1b[0m");
    println!("\x1b[36m║           Source Map Source Recovery                         ║\x1b[0m");
    println!("\x1b[36m╚══════════════════════════════════════════════════════════════╝\x1b[0m");
    println!();
}
