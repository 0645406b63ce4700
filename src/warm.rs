//! Ahead-of-time variant generation.
//!
//! `warm` walks an asset tree, turns every source asset into the virtual
//! reference a bundler would have seen (`img/icon.png` -> `img/icon.webp`) and
//! runs the engine on those references in parallel. Because artifacts are
//! content-addressed, a second run over an unchanged tree only reports cache
//! hits.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytesize::ByteSize;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::engine::{Decision, Engine};
use crate::paths;
use crate::progress::ProgressCallback;
use crate::resolver::ResolveContext;

/// Errors that stop a warm run before any asset is processed.
#[derive(Debug, Error)]
pub enum WarmError {
    /// The root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The worker pool could not be created.
    #[error("Failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Options for a warm run.
#[derive(Clone)]
pub struct WarmOptions {
    /// Worker threads; 0 lets rayon decide.
    pub io_threads: usize,
    /// Optional progress sink.
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl Default for WarmOptions {
    fn default() -> Self {
        Self {
            io_threads: 4,
            progress: None,
        }
    }
}

impl fmt::Debug for WarmOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmOptions")
            .field("io_threads", &self.io_threads)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Result for one virtual reference.
#[derive(Debug, Clone, Serialize)]
pub struct WarmItem {
    /// The virtual reference that was processed
    pub reference: String,
    /// What the engine decided, if it succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// The failure, if it did not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Totals for a warm run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmSummary {
    /// Source assets found under the root
    pub scanned: usize,
    /// New artifacts written
    pub transformed: usize,
    /// Artifacts that already existed
    pub cache_hits: usize,
    /// References sent back to the original asset
    pub originals: usize,
    /// References left untouched
    pub skipped: usize,
    /// References that failed, including unreadable walk entries
    pub failed: usize,
    /// Stale artifacts removed while writing
    pub reclaimed: usize,
    /// Bytes saved by newly written artifacts
    pub bytes_saved: u64,
}

impl WarmSummary {
    fn record(&mut self, item: &WarmItem) {
        match &item.decision {
            Some(Decision::Transformed { reclaimed, .. }) => {
                self.transformed += 1;
                self.reclaimed += reclaimed;
            }
            Some(Decision::CacheHit { .. }) => self.cache_hits += 1,
            Some(Decision::Original { .. }) => self.originals += 1,
            Some(Decision::Skip { .. }) => self.skipped += 1,
            None => self.failed += 1,
        }
        if let Some(decision) = &item.decision {
            self.bytes_saved += decision.bytes_saved();
        }
    }
}

impl fmt::Display for WarmSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} assets: {} transformed, {} cached, {} original, {} skipped, {} failed ({} saved",
            self.scanned,
            self.transformed,
            self.cache_hits,
            self.originals,
            self.skipped,
            self.failed,
            ByteSize::b(self.bytes_saved),
        )?;
        if self.reclaimed > 0 {
            write!(f, ", {} stale removed", self.reclaimed)?;
        }
        write!(f, ")")
    }
}

/// Per-reference results plus totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmReport {
    /// Totals
    pub summary: WarmSummary,
    /// One entry per distinct virtual reference, sorted by reference
    pub items: Vec<WarmItem>,
}

/// Source assets under `root` whose extension is in `extensions`, sorted.
///
/// Returns the assets and the number of walk entries that could not be read.
pub fn discover(root: &Path, extensions: &[String]) -> (Vec<PathBuf>, usize) {
    let mut found = Vec::new();
    let mut unreadable = 0;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            log::warn!("Skipping non-UTF-8 file name: {}", entry.path().display());
            unreadable += 1;
            continue;
        };
        let acceptable = paths::extension_of(name)
            .map(|ext| extensions.iter().any(|e| e == ext))
            .unwrap_or(false);
        if acceptable {
            found.push(entry.into_path());
        }
    }

    (found, unreadable)
}

/// Virtual reference for every source asset, without duplicates.
///
/// `icon.png` and `icon.jpg` in one directory share `icon.webp`; the resolver
/// decides which of them backs it.
fn references_for(engine: &Engine, sources: &[PathBuf]) -> BTreeSet<String> {
    sources
        .iter()
        .filter_map(|p| p.to_str())
        .filter_map(|s| engine.mapper().derive_virtual_artifact_path(s).ok())
        .collect()
}

/// Run the engine over every source asset under `root`.
///
/// Failures of single references are collected in the report, never
/// returned.
///
/// # Errors
///
/// [`WarmError`] if `root` is not a directory or the pool can't be built.
pub fn warm(
    engine: &Engine,
    ctx: &ResolveContext,
    root: &Path,
    options: &WarmOptions,
) -> Result<WarmReport, WarmError> {
    if !root.is_dir() {
        return Err(WarmError::NotADirectory(root.to_path_buf()));
    }

    let (sources, unreadable) = discover(root, &engine.config().extensions);
    let references: Vec<String> = references_for(engine, &sources).into_iter().collect();
    log::info!(
        "Found {} source assets ({} references) under {}",
        sources.len(),
        references.len(),
        root.display()
    );

    if let Some(progress) = &options.progress {
        progress.on_start(references.len());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.io_threads)
        .build()?;
    let done = AtomicUsize::new(0);

    let items: Vec<WarmItem> = pool.install(|| {
        references
            .par_iter()
            .map(|reference| {
                let item = match engine.process(ctx, reference) {
                    Ok(decision) => WarmItem {
                        reference: reference.clone(),
                        decision: Some(decision),
                        error: None,
                    },
                    Err(e) => {
                        log::warn!("{reference}: {e}");
                        WarmItem {
                            reference: reference.clone(),
                            decision: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(progress) = &options.progress {
                    progress.on_progress(current, reference);
                }
                item
            })
            .collect()
    });

    if let Some(progress) = &options.progress {
        progress.on_finish();
    }

    let mut summary = WarmSummary {
        scanned: sources.len(),
        failed: unreadable,
        ..WarmSummary::default()
    };
    for item in &items {
        summary.record(item);
    }
    log::info!("{summary}");

    Ok(WarmReport { summary, items })
}
