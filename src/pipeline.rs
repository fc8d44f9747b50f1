//! One migration run: scan → provision → rewrite → report.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ScanSettings};
use crate::error::{MigratorError, Result};
use crate::progress::ProgressSink;
use crate::provision::{MessagingPlatform, Provisioner};
use crate::report::{ReportWriter, RunReport};
use crate::rewrite::{BackupStore, Rewriter};
use crate::scanner::{ScanOutcome, Scanner};

pub const LOCK_FILE: &str = ".webhook-migrator.lock";

/// Exclusive marker file in the scan root; removed on drop.
///
/// Two runs against the same tree would race on the remote category and on
/// the files, so the second one is refused.
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    tracing::warn!("Failed to record pid in {}: {}", path.display(), e);
                }
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(MigratorError::RunLocked(path)),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a Config,
    sink: &'a dyn ProgressSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, sink: &'a dyn ProgressSink) -> Self {
        Self { config, sink }
    }

    /// Scan only. No remote calls, no file writes.
    pub fn scan_only(&self, cancel: &CancellationToken) -> Result<ScanOutcome> {
        self.config.validate_for_scan()?;
        Ok(self.scan(cancel))
    }

    fn scan(&self, cancel: &CancellationToken) -> ScanOutcome {
        let scanner = Scanner::new(self.scan_settings(), self.sink);
        scanner.scan_with_cancel(&self.config.root, cancel)
    }

    /// Scan settings that also prune our own backup and output directories,
    /// which hold copies of the old URLs when placed inside the root.
    fn scan_settings(&self) -> ScanSettings {
        let settings = &self.config.settings;
        let mut scan = settings.scan();
        for dir in [&settings.backup_dir, &settings.output_dir] {
            if let Some(name) = dir.file_name() {
                scan.skip_dirs.push(name.to_string_lossy().to_lowercase());
            }
        }
        scan
    }

    /// Full run. Returns the report that was written to the output directory.
    pub async fn run<P>(&self, platform: &P, cancel: &CancellationToken) -> Result<RunReport>
    where
        P: MessagingPlatform + ?Sized,
    {
        self.config.validate()?;
        let _lock = RunLock::acquire(&self.config.root)?;
        let started = Local::now();

        self.sink.emit("Step 1/4: scanning resources");
        let scan = self.scan(cancel);
        let mut stats = scan.stats.clone();

        if scan.is_empty() || scan.cancelled {
            if scan.is_empty() && !scan.cancelled {
                self.sink.emit("No webhooks found");
            }
            let mut report = RunReport::new(started, stats).with_occurrences(&scan.occurrences);
            report.skipped_files = scan.skipped;
            report.cancelled = scan.cancelled;
            return self.finish(report);
        }

        // Created before any remote mutation so a bad backup path fails early.
        let backups = self.backup_store(started)?;

        self.sink.emit("Step 2/4: provisioning channels");
        let provisioner = Provisioner::new(platform, self.config.settings.pacing(), self.sink);
        let provisioned = provisioner
            .provision(&scan.by_resource, &self.config.credentials.category_id, cancel)
            .await?;
        provisioned.record(&mut stats);

        let mut report = RunReport::new(started, stats.clone())
            .with_mapping(&provisioned.mapping)
            .with_occurrences(&scan.occurrences);
        report.skipped_files = scan.skipped.clone();

        if !cancel.is_cancelled() {
            self.sink.emit("Step 3/4: updating files");
            let mut rewriter = Rewriter::new(backups, self.sink);
            let rewritten = rewriter.rewrite(&provisioned.mapping, &scan.occurrences, cancel);
            rewritten.record(&mut stats);
            report.statistics = stats;
            report.backup_dir = rewritten.backup_dir;
            report.skipped_files.extend(rewritten.skipped);
        }

        report.channels = provisioned.channels;
        report.failures = provisioned.failures;
        report.already_migrated = provisioned.already_migrated;
        report.cancelled = cancel.is_cancelled();

        if !report.failures.is_empty() {
            let skipped: Vec<&str> = report.failures.iter().map(|f| f.resource.as_str()).collect();
            self.sink
                .emit(&format!("Skipped resources: {}", skipped.join(", ")));
        }

        self.finish(report)
    }

    fn backup_store(&self, started: DateTime<Local>) -> Result<Option<BackupStore>> {
        match self.config.settings.backup_dir() {
            Some(dir) => Ok(Some(BackupStore::create(dir, started)?)),
            None => Ok(None),
        }
    }

    fn finish(&self, report: RunReport) -> Result<RunReport> {
        self.sink.emit("Step 4/4: saving results");
        let writer = ReportWriter::new(&self.config.settings.output_dir);
        let (json_path, guide_path) = writer.write(&report)?;
        tracing::info!(
            "Report written to {} and {}",
            json_path.display(),
            guide_path.display()
        );
        self.sink.summary(&report.statistics);
        Ok(report)
    }
}
