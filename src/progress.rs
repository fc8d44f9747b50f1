//! Progress reporting.
//!
//! Pipeline stages only know about [`ProgressSink::emit`]; how messages are
//! delivered (log lines, a terminal spinner, nothing) is up to the caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

use crate::models::RunStatistics;

/// Receiver for progress messages. Delivery is fire-and-forget.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, message: &str);

    /// Structured summary at the end of a run.
    fn summary(&self, stats: &RunStatistics) {
        self.emit(&format!(
            "Done: {} files scanned, {} webhooks in {} resources, {} endpoints created, {} files updated ({} replacements)",
            stats.files_scanned,
            stats.webhooks_found,
            stats.resources_found,
            stats.endpoints_created,
            stats.files_updated,
            stats.replacements
        ));
    }
}

/// Discards everything.
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn emit(&self, _message: &str) {}
}

/// Forwards messages to `tracing` at info level.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Terminal sink: a spinner showing the latest message, with every message
/// also printed above it.
pub struct ConsoleSink {
    bar: ProgressBar,
}

impl ConsoleSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, message: &str) {
        self.bar.println(message);
        self.bar.set_message(message.to_string());
    }

    fn summary(&self, stats: &RunStatistics) {
        self.bar.println("");
        self.bar.println("Scan results:");
        self.bar.println(format!("  Files scanned:        {}", stats.files_scanned));
        self.bar.println(format!("  Files with webhooks:  {}", stats.files_with_matches));
        self.bar.println(format!("  Resources found:      {}", stats.resources_found));
        self.bar.println(format!("  Total webhooks:       {}", stats.webhooks_found));
        self.bar.println("Actions taken:");
        self.bar.println(format!("  Channels created:     {}", stats.channels_created));
        self.bar.println(format!("  Channels reused:      {}", stats.channels_reused));
        self.bar.println(format!("  New webhooks:         {}", stats.endpoints_created));
        self.bar.println(format!("  Already migrated:     {}", stats.already_migrated));
        self.bar.println(format!("  Files updated:        {}", stats.files_updated));
        self.bar.println(format!("  Replacements:         {}", stats.replacements));
        self.bar.println(format!("  Files backed up:      {}", stats.files_backed_up));
    }
}

/// Collects messages in memory.
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

/// Shared counters for a scan running on several threads.
#[derive(Clone)]
pub struct ScanProgress {
    inner: Arc<Inner>,
}

struct Inner {
    files_total: AtomicUsize,
    files_processed: AtomicUsize,
    webhooks_found: AtomicUsize,
    skipped: AtomicUsize,
}

pub struct ProgressSnapshot {
    pub files_total: usize,
    pub files_processed: usize,
    pub webhooks_found: usize,
    pub skipped: usize,
    pub progress_pct: f64,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                files_total: AtomicUsize::new(0),
                files_processed: AtomicUsize::new(0),
                webhooks_found: AtomicUsize::new(0),
                skipped: AtomicUsize::new(0),
            }),
        }
    }

    pub fn start(&self, total_files: usize) {
        self.inner.files_total.store(total_files, Ordering::Release);
        self.inner.files_processed.store(0, Ordering::Release);
        self.inner.webhooks_found.store(0, Ordering::Release);
        self.inner.skipped.store(0, Ordering::Release);
    }

    /// Record one processed file and return the new processed count.
    pub fn inc(&self, webhooks: usize) -> usize {
        self.inner.webhooks_found.fetch_add(webhooks, Ordering::Relaxed);
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_skipped(&self) -> usize {
        self.inner.skipped.fetch_add(1, Ordering::Relaxed);
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let files_total = self.inner.files_total.load(Ordering::Acquire);
        let files_processed = self.inner.files_processed.load(Ordering::Acquire);
        let webhooks_found = self.inner.webhooks_found.load(Ordering::Acquire);
        let skipped = self.inner.skipped.load(Ordering::Acquire);

        let progress_pct = if files_total > 0 {
            (files_processed as f64 / files_total as f64) * 100.0
        } else {
            0.0
        };

        ProgressSnapshot {
            files_total,
            files_processed,
            webhooks_found,
            skipped,
            progress_pct,
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}
