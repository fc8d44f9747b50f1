//! Replace old webhook URLs with their new endpoints in place.
//!
//! Replacement works on raw bytes with exact literals, so bytes that are not
//! valid UTF-8 survive untouched and the backup is the file as it was.
//! New content lands through a temp file in the same directory and a rename,
//! so an interrupted write leaves the original intact.

pub mod backup;

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{EndpointMapping, OccurrenceIndex, RunStatistics, SkippedFile, WebhookUrl};
use crate::progress::ProgressSink;

pub use backup::BackupStore;

const PROGRESS_EVERY: usize = 25;

/// Outcome of rewriting one file.
#[derive(Debug, PartialEq, Eq)]
pub enum FileRewrite {
    Updated {
        replacements: usize,
        backup: Option<PathBuf>,
    },
    Unchanged,
    Skipped(SkippedFile),
}

#[derive(Debug, Default)]
pub struct RewriteOutcome {
    pub files_updated: usize,
    pub replacements: usize,
    pub files_backed_up: usize,
    pub skipped: Vec<SkippedFile>,
    pub backup_dir: Option<PathBuf>,
    pub cancelled: bool,
}

impl RewriteOutcome {
    pub fn record(&self, stats: &mut RunStatistics) {
        stats.files_updated += self.files_updated;
        stats.replacements += self.replacements;
        stats.files_backed_up += self.files_backed_up;
        stats.files_skipped += self.skipped.len();
    }
}

pub struct Rewriter<'a> {
    backups: Option<BackupStore>,
    sink: &'a dyn ProgressSink,
}

impl<'a> Rewriter<'a> {
    /// `backups = None` rewrites without keeping a copy of the originals.
    pub fn new(backups: Option<BackupStore>, sink: &'a dyn ProgressSink) -> Self {
        Self { backups, sink }
    }

    /// Files to touch, each with the resource it was attributed to.
    pub fn plan(mapping: &EndpointMapping, occurrences: &OccurrenceIndex) -> BTreeMap<PathBuf, String> {
        let mut files = BTreeMap::new();
        for (resource, old, _) in mapping.iter() {
            for occurrence in occurrences.get(old).into_iter().flatten() {
                if occurrence.resource == resource {
                    files
                        .entry(occurrence.path.clone())
                        .or_insert_with(|| occurrence.resource.clone());
                }
            }
        }
        files
    }

    pub fn rewrite(
        &mut self,
        mapping: &EndpointMapping,
        occurrences: &OccurrenceIndex,
        cancel: &CancellationToken,
    ) -> RewriteOutcome {
        let files = Self::plan(mapping, occurrences);
        let mut outcome = RewriteOutcome {
            backup_dir: self.backups.as_ref().map(|b| b.dir().to_path_buf()),
            ..Default::default()
        };

        if let Some(dir) = &outcome.backup_dir {
            self.sink.emit(&format!("Backup directory: {}", dir.display()));
        }
        self.sink.emit(&format!("Updating {} files", files.len()));

        for (idx, (path, resource)) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                self.sink.emit("Rewrite cancelled");
                break;
            }

            let Some(pairs) = mapping.for_resource(resource) else {
                continue;
            };

            match self.rewrite_file(path, pairs) {
                FileRewrite::Updated {
                    replacements,
                    backup,
                } => {
                    outcome.files_updated += 1;
                    outcome.replacements += replacements;
                    if backup.is_some() {
                        outcome.files_backed_up += 1;
                    }
                }
                FileRewrite::Unchanged => {}
                FileRewrite::Skipped(skipped) => {
                    tracing::debug!("Skipped {}: {}", skipped.path.display(), skipped.reason);
                    outcome.skipped.push(skipped);
                }
            }

            if idx > 0 && idx % PROGRESS_EVERY == 0 {
                self.sink
                    .emit(&format!("Progress: {}/{} files updated", idx, files.len()));
            }
        }

        self.sink.emit(&format!(
            "Updated {} files ({} replacements)",
            outcome.files_updated, outcome.replacements
        ));
        outcome
    }

    /// Replace every mapped URL in one file, backing it up first.
    pub fn rewrite_file(&mut self, path: &Path, pairs: &BTreeMap<WebhookUrl, WebhookUrl>) -> FileRewrite {
        let skipped = |reason: String| {
            FileRewrite::Skipped(SkippedFile {
                path: path.to_path_buf(),
                reason,
            })
        };

        let original = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return skipped(format!("read failed: {}", e)),
        };

        let mut content = original.clone();
        let mut replacements = 0;
        for (old, new) in pairs {
            let (updated, count) = replace_all(&content, old.as_str().as_bytes(), new.as_str().as_bytes());
            if count > 0 {
                content = updated;
                replacements += count;
            }
        }

        if replacements == 0 {
            return FileRewrite::Unchanged;
        }

        let backup = match self.backups.as_mut() {
            Some(store) => match store.store(path, &original) {
                Ok(target) => Some(target),
                Err(e) => return skipped(format!("backup failed: {}", e)),
            },
            None => None,
        };

        if let Err(e) = write_in_place(path, &content) {
            return skipped(format!("write failed: {}", e));
        }

        FileRewrite::Updated {
            replacements,
            backup,
        }
    }
}

/// Swap in new content through a sibling temp file and a rename, so a failed
/// write never leaves the target truncated. The target keeps its permissions.
fn write_in_place(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)?.permissions();

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Replace every non-overlapping occurrence of `needle`, left to right.
pub fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> (Vec<u8>, usize) {
    if needle.is_empty() || haystack.len() < needle.len() {
        return (haystack.to_vec(), 0);
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut count = 0;
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
            count += 1;
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    (out, count)
}
