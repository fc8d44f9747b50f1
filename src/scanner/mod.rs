//! Discovery: walk the tree, extract webhook URLs, attribute them to
//! resources and build the two indexes the later stages consume.

pub mod attribution;
pub mod extractor;
pub mod walker;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::config::ScanSettings;
use crate::models::{Occurrence, OccurrenceIndex, ResourceUrlIndex, RunStatistics, SkippedFile, WebhookUrl};
use crate::progress::{ProgressSink, ScanProgress};

pub use attribution::{resource_for, resource_name, RESOURCE_CONTAINER};
pub use extractor::{ExtractionResult, UrlMatch, WebhookExtractor, MATCHERS};
pub use walker::FileWalker;

/// Outcome of scanning one file.
#[derive(Debug)]
pub enum FileScan {
    Matched {
        path: PathBuf,
        resource: String,
        result: ExtractionResult,
    },
    NoMatch,
    Skipped(SkippedFile),
}

/// Indexes and counters produced by one scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub by_resource: ResourceUrlIndex,
    pub occurrences: OccurrenceIndex,
    pub stats: RunStatistics,
    pub skipped: Vec<SkippedFile>,
    pub cancelled: bool,
}

impl ScanOutcome {
    pub fn is_empty(&self) -> bool {
        self.by_resource.is_empty()
    }

    pub fn distinct_urls(&self) -> usize {
        self.occurrences.len()
    }

    /// Fold one file result into the indexes. Single writer, walk order.
    fn absorb(&mut self, scan: FileScan) {
        match scan {
            FileScan::Matched {
                path,
                resource,
                result,
            } => {
                self.stats.files_with_matches += 1;
                self.stats.webhooks_found += result.matches.len();

                for url in result.distinct_urls() {
                    self.by_resource
                        .entry(resource.clone())
                        .or_default()
                        .insert(url.clone());
                    self.occurrences
                        .entry(url.clone())
                        .or_default()
                        .push(Occurrence {
                            path: path.clone(),
                            resource: resource.clone(),
                        });
                }
            }
            FileScan::NoMatch => {}
            FileScan::Skipped(skipped) => {
                self.stats.files_skipped += 1;
                self.skipped.push(skipped);
            }
        }
    }

    /// URLs that were found under more than one resource.
    pub fn shared_urls(&self) -> Vec<(&WebhookUrl, BTreeSet<&str>)> {
        self.occurrences
            .iter()
            .filter_map(|(url, occurrences)| {
                let resources: BTreeSet<&str> =
                    occurrences.iter().map(|o| o.resource.as_str()).collect();
                (resources.len() > 1).then_some((url, resources))
            })
            .collect()
    }
}

pub struct Scanner<'a> {
    settings: ScanSettings,
    extractor: WebhookExtractor,
    sink: &'a dyn ProgressSink,
}

impl<'a> Scanner<'a> {
    pub fn new(settings: ScanSettings, sink: &'a dyn ProgressSink) -> Self {
        Self {
            settings,
            extractor: WebhookExtractor::new(),
            sink,
        }
    }

    pub fn scan(&self, root: &Path) -> ScanOutcome {
        self.scan_with_cancel(root, &CancellationToken::new())
    }

    /// Scan `root`. Files are extracted in parallel and merged in walk order;
    /// the token is checked before each file.
    pub fn scan_with_cancel(&self, root: &Path, cancel: &CancellationToken) -> ScanOutcome {
        let walker = FileWalker::new(&self.settings);
        let files: Vec<PathBuf> = walker.walk(root).collect();
        self.sink
            .emit(&format!("Scanning {} files in {}", files.len(), root.display()));

        let progress = ScanProgress::new();
        progress.start(files.len());
        let every = self.settings.progress_every;

        let results: Vec<Option<FileScan>> = files
            .par_iter()
            .map(|file| {
                if cancel.is_cancelled() {
                    return None;
                }
                let scan = self.scan_file(root, file);
                let processed = match &scan {
                    FileScan::Matched { result, .. } => progress.inc(result.matches.len()),
                    FileScan::NoMatch => progress.inc(0),
                    FileScan::Skipped(_) => progress.inc_skipped(),
                };
                if processed % every == 0 {
                    let snap = progress.snapshot();
                    self.sink.emit(&format!(
                        "Progress: {}/{} files ({:.0}%), {} webhooks so far, {} skipped",
                        snap.files_processed,
                        snap.files_total,
                        snap.progress_pct,
                        snap.webhooks_found,
                        snap.skipped
                    ));
                }
                Some(scan)
            })
            .collect();

        let mut outcome = ScanOutcome::default();
        for result in results {
            match result {
                Some(scan) => {
                    outcome.stats.files_scanned += 1;
                    outcome.absorb(scan);
                }
                None => outcome.cancelled = true,
            }
        }
        outcome.stats.resources_found = outcome.by_resource.len();

        for skipped in &outcome.skipped {
            tracing::debug!("Skipped {}: {}", skipped.path.display(), skipped.reason);
        }
        for (url, resources) in outcome.shared_urls() {
            tracing::info!(
                "Webhook {} is shared by {} resources, each gets its own endpoint",
                url.id(),
                resources.len()
            );
        }

        self.sink.emit(&format!(
            "Scan complete: {} files scanned, {} with webhooks, {} resources, {} webhooks",
            outcome.stats.files_scanned,
            outcome.stats.files_with_matches,
            outcome.stats.resources_found,
            outcome.stats.webhooks_found
        ));
        if outcome.cancelled {
            self.sink.emit("Scan cancelled before all files were read");
        }

        outcome
    }

    pub fn scan_file(&self, root: &Path, path: &Path) -> FileScan {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                return FileScan::Skipped(SkippedFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        let result = self.extractor.extract_bytes(&bytes);
        if result.is_empty() {
            return FileScan::NoMatch;
        }

        FileScan::Matched {
            path: path.to_path_buf(),
            resource: resource_for(root, path),
            result,
        }
    }
}
