mod chunk;
mod classify;
mod discover;
mod error;
mod ident;
mod manifest;
mod model;
mod parser;
mod pipeline;
mod settings;
mod writer;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use crate::chunk::CharEstimator;
use crate::error::{ConfigError, PageError};
use crate::manifest::ManifestBuilder;
use crate::pipeline::{PageContext, PageOutput};
use crate::settings::{Overrides, RunConfig, Settings};

const PROGRESS_EVERY: usize = 250;

#[derive(Parser)]
#[command(
    name = "kb_chunker",
    about = "Split a tree of markdown pages into retrieval-sized units plus a manifest"
)]
struct Cli {
    /// Knowledge-base slug stamped on every unit
    kb_slug: String,
    /// Directory tree of pages to read
    input_dir: PathBuf,
    /// Destination directory (cleared before the run)
    output_dir: PathBuf,
    /// Token budget per flat chunk [default: 800]
    chunk_max_tokens: Option<usize>,
    /// Flat chunk count above which a page is grouped by section [default: 8]
    large_chunk_threshold: Option<usize>,
    /// Token budget per grouped chunk [default: 3000]
    section_max_tokens: Option<usize>,
    /// Overlap carried between grouped chunks [default: 100]
    overlap_tokens: Option<usize>,
    /// Year tag [default: current year]
    year: Option<i32>,
    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            chunk_max_tokens: self.chunk_max_tokens,
            large_chunk_threshold: self.large_chunk_threshold,
            section_max_tokens: self.section_max_tokens,
            overlap_tokens: self.overlap_tokens,
            year: self.year,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(summary) => {
            summary.print();
            let elapsed = t0.elapsed();
            if elapsed.as_secs() >= 1 {
                println!("\nDone in {}", format_duration(elapsed));
            }
            ExitCode::SUCCESS
        }
        Err(err) if err.downcast_ref::<ConfigError>().is_some() => {
            error!("{:#}", err);
            ExitCode::from(2)
        }
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<RunSummary> {
    let settings = Settings::load(cli.config.as_deref())?.with_overrides(cli.overrides());
    let run = RunConfig::resolve(&cli.kb_slug, &cli.input_dir, &cli.output_dir, settings)?;

    let pages = discover::discover_pages(&run.input_dir, Some(&run.output_dir));
    if pages.is_empty() {
        return Err(ConfigError::NoInputFiles(run.input_dir.clone()).into());
    }
    info!(
        pages = pages.len(),
        input = %run.input_dir.display(),
        output = %run.output_dir.display(),
        "starting run"
    );

    writer::prepare_output(&run.output_dir)
        .with_context(|| format!("prepare output directory {}", run.output_dir.display()))?;
    process_pages(&run, &pages)
}

struct RunSummary {
    pages_ok: usize,
    pages_failed: usize,
    large_pages: usize,
    units: usize,
    manifest_path: PathBuf,
}

impl RunSummary {
    fn print(&self) {
        println!(
            "Processed {} pages ({} ok, {} failed, {} large).",
            self.pages_ok + self.pages_failed,
            self.pages_ok,
            self.pages_failed,
            self.large_pages,
        );
        println!("Wrote {} units.", self.units);
        println!("Manifest: {}", self.manifest_path.display());
    }
}

fn process_pages(run: &RunConfig, pages: &[PathBuf]) -> Result<RunSummary> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let estimator = CharEstimator::default();
    let ctx = PageContext {
        kb_slug: &run.kb_slug,
        year: run.settings.year,
        params: run.settings.params(),
        estimator: &estimator,
        rules: &run.settings.classifier,
    };

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut manifest = ManifestBuilder::new(&run.kb_slug, run.settings.year);
    let mut first_seen: HashMap<String, PathBuf> = HashMap::new();
    let (mut ok, mut failed, mut large) = (0, 0, 0);

    for batch in pages.chunks(run.settings.batch_size) {
        let results: Vec<_> = batch
            .par_iter()
            .map(|path| pipeline::process_page(path, &ctx))
            .collect();

        for (path, result) in batch.iter().zip(results) {
            let outcome =
                result.and_then(|page| store_page(&mut first_seen, &run.output_dir, page));

            match outcome {
                Ok(page) => {
                    ok += 1;
                    if page.strategy.is_large() {
                        large += 1;
                    }
                    for (unit, out) in page.units.into_iter().zip(page.written) {
                        manifest.record(path, &out, unit.attributes);
                    }
                }
                Err(err) => {
                    failed += 1;
                    pb.suspend(|| warn!(path = %path.display(), "page failed: {}", err));
                }
            }

            pb.inc(1);
            let done = ok + failed;
            if done % PROGRESS_EVERY == 0 {
                pb.suspend(|| {
                    info!(done, total = pages.len(), failed, units = manifest.len(), "progress")
                });
            }
        }
    }

    pb.finish_and_clear();

    let units = manifest.len();
    let manifest_path = manifest
        .finish(ok, failed)
        .write_atomic(&run.output_dir)?;
    info!(ok, failed, units, manifest = %manifest_path.display(), "run complete");

    Ok(RunSummary {
        pages_ok: ok,
        pages_failed: failed,
        large_pages: large,
        units,
        manifest_path,
    })
}

/// Write a page unless an earlier page already owns its doc_id.
///
/// The first page in discovery order whose units are written owns the
/// doc_id. A page that fails to write claims nothing, so a later page with
/// the same canonical URL can still produce the document.
fn store_page(
    first_seen: &mut HashMap<String, PathBuf>,
    dir: &Path,
    page: PageOutput,
) -> Result<WrittenPage, PageError> {
    if let Some(first) = first_seen.get(&page.doc_id) {
        return Err(PageError::DuplicateDocument {
            doc_id: page.doc_id,
            first: first.clone(),
        });
    }
    let doc_id = page.doc_id.clone();
    let source = page.source_path.clone();
    let written = write_page(dir, page)?;
    first_seen.insert(doc_id, source);
    Ok(written)
}

#[derive(Debug)]
struct WrittenPage {
    strategy: chunk::Strategy,
    units: Vec<model::Unit>,
    written: Vec<PathBuf>,
}

/// Write every unit of a page. On failure the page's files written so far
/// are removed, so the page leaves nothing behind.
fn write_page(dir: &Path, page: PageOutput) -> Result<WrittenPage, PageError> {
    let mut names = HashSet::with_capacity(page.units.len());
    for unit in &page.units {
        let name = writer::unit_file_name(&unit.attributes);
        if !names.insert(name.clone()) {
            return Err(PageError::UnitFileCollision { file: name });
        }
    }

    let mut written = Vec::with_capacity(page.units.len());
    for unit in &page.units {
        match writer::write_unit(dir, unit) {
            Ok(path) => written.push(path),
            Err(err) => {
                for path in &written {
                    let _ = fs::remove_file(path);
                }
                return Err(err);
            }
        }
    }
    Ok(WrittenPage {
        strategy: page.strategy,
        units: page.units,
        written,
    })
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──
