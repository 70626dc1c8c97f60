//! Main extractor orchestrating all components.

use crate::config::Config;
use crate::discovery::sourcemap_probe::probe;
use crate::discovery::{locate_source_map, scan_scripts, Fetch, Fetcher};
use crate::notify::ConsoleOutput;
use crate::parser::parse_source_map;
use crate::resolver::{resolve_sources, ResolveOptions, ResolvedSources};
use crate::types::{
    ExtractionReport, ParsedSourceMap, Result, ScriptReference, SourceMapDescriptor, WrittenFile,
};
use crate::writer::TreeWriter;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Tuning for a run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub resolve: ResolveOptions,
    /// Guess map URLs for external scripts without a directive.
    pub probe: bool,
    /// Scripts processed at once.
    pub concurrency: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            resolve: ResolveOptions::default(),
            probe: false,
            concurrency: 4,
        }
    }
}

/// A source map that was found and parsed for a script.
struct FoundMap {
    map: ParsedSourceMap,
    /// Base URL for fetching sources without embedded content.
    base: Url,
    /// Map URL, or `inline:<script url>`.
    origin: String,
}

/// Everything recovered from one script, before anything is written.
#[derive(Default)]
struct ScriptOutcome {
    map_origin: Option<String>,
    resolved: ResolvedSources,
    errors: Vec<String>,
}

/// Runs the page → scripts → maps → files pipeline.
pub struct Extractor<F: Fetch = Fetcher> {
    fetcher: F,
    options: ExtractOptions,
    console: ConsoleOutput,
}

impl Extractor<Fetcher> {
    /// Create an extractor that talks HTTP, configured from the command line.
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher = Fetcher::new(config.http_config(), config.rate_limit)?;
        let console = ConsoleOutput::new(config.verbose, config.json, config.quiet);
        Ok(Self::with_fetcher(fetcher, config.extract_options(), console))
    }
}

impl<F: Fetch> Extractor<F> {
    pub fn with_fetcher(fetcher: F, options: ExtractOptions, console: ConsoleOutput) -> Self {
        Self {
            fetcher,
            options,
            console,
        }
    }

    /// Recover every source reachable from `target` into `output_dir`.
    ///
    /// Only a failure to fetch the page itself (or to create the output
    /// directory) is an error; everything else is recorded in the report.
    pub async fn extract(&self, target: &Url, output_dir: &Path) -> Result<ExtractionReport> {
        let start_time = Instant::now();
        self.console
            .print_scan_start(target.as_str(), &output_dir.display().to_string());

        let page = self.fetcher.fetch(target).await?;
        let scripts = scan_scripts(&page.body, &page.final_url);
        self.console.print_info(&format!(
            "Found {} script entries on {}",
            scripts.len(),
            page.final_url
        ));

        let mut writer = TreeWriter::new(output_dir)?;

        // Ordered buffering keeps results in page order whatever finishes first
        let pb = self
            .console
            .create_progress_bar(scripts.len() as u64, "Processing scripts");
        let outcomes: Vec<ScriptOutcome> = stream::iter(scripts.iter())
            .map(|script| self.recover_script(script))
            .buffered(self.options.concurrency.max(1))
            .inspect(|_| {
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
            })
            .collect()
            .await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let mut report = ExtractionReport {
            target: target.to_string(),
            page_url: page.final_url.to_string(),
            output_dir: writer.root().display().to_string(),
            scripts_found: scripts.len(),
            maps_processed: 0,
            files: Vec::new(),
            unresolved: Vec::new(),
            rejected: Vec::new(),
            errors: Vec::new(),
            duration_secs: 0.0,
        };

        for outcome in outcomes {
            let ScriptOutcome {
                map_origin,
                resolved,
                errors,
            } = outcome;
            report.errors.extend(errors);
            report.unresolved.extend(resolved.unresolved);
            report.rejected.extend(resolved.rejected);

            let Some(map_origin) = map_origin else {
                continue;
            };
            report.maps_processed += 1;

            for file in resolved.files {
                let path = file.relative_path.display().to_string();
                match writer.write(&file) {
                    Ok(sha256) => {
                        self.console.print_saved(&path, file.content.len());
                        report.files.push(WrittenFile {
                            path,
                            bytes: file.content.len(),
                            source: file.source,
                            map: map_origin.clone(),
                            sha256,
                        });
                    }
                    Err(e) => {
                        warn!("Failed to write {}: {}", path, e);
                        report.errors.push(format!("{}: {}", path, e));
                    }
                }
            }
        }

        report.duration_secs = start_time.elapsed().as_secs_f64();
        info!(
            "Processed {} maps, saved {} files to {}",
            report.maps_processed,
            writer.files_written(),
            report.output_dir
        );

        Ok(report)
    }

    /// Find, parse and resolve the map of one script. Never fails the run.
    async fn recover_script(&self, script: &ScriptReference) -> ScriptOutcome {
        let mut outcome = ScriptOutcome::default();

        match self.find_map(script).await {
            Ok(Some(found)) => {
                self.console.print_progress(&format!(
                    "{}: {} sources from {}",
                    script.label(),
                    found.map.len(),
                    found.origin
                ));
                outcome.resolved =
                    resolve_sources(&self.fetcher, &found.map, &found.base, &self.options.resolve)
                        .await;
                outcome.map_origin = Some(found.origin);
            }
            Ok(None) => debug!("No sourceMappingURL found in {}", script.label()),
            Err(e) => {
                warn!("Skipping {}: {}", script.label(), e);
                outcome.errors.push(format!("{}: {}", script.label(), e));
            }
        }

        outcome
    }

    async fn find_map(&self, script: &ScriptReference) -> Result<Option<FoundMap>> {
        let fetched;
        let (js, script_url, header) = match script.body {
            Some(ref body) => (body.as_str(), &script.url, None),
            None => {
                fetched = self.fetcher.fetch(&script.url).await?;
                (
                    fetched.body.as_str(),
                    &fetched.final_url,
                    fetched.source_map_header.as_deref(),
                )
            }
        };

        match locate_source_map(js, script_url, header)? {
            Some(SourceMapDescriptor::Inline(bytes)) => Ok(Some(FoundMap {
                map: parse_source_map(&bytes)?,
                base: script_url.clone(),
                origin: format!("inline:{}", script_url),
            })),
            Some(SourceMapDescriptor::External(map_url)) => {
                let map_file = self.fetcher.fetch(&map_url).await?;
                Ok(Some(FoundMap {
                    map: parse_source_map(map_file.body.as_bytes())?,
                    origin: map_file.final_url.to_string(),
                    base: map_file.final_url,
                }))
            }
            None if self.options.probe && !script.is_inline => {
                match probe(&self.fetcher, script_url).await {
                    Some(map_file) => Ok(Some(FoundMap {
                        map: parse_source_map(map_file.body.as_bytes())?,
                        origin: map_file.final_url.to_string(),
                        base: map_file.final_url,
                    })),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }
}
