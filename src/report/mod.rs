//! Persist the outcome of a run: a JSON record for tooling and a text guide
//! grouped by resource for humans.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    EndpointMapping, MappingEntry, Occurrence, OccurrenceIndex, ProvisionedChannel,
    ResourceFailure, RunStatistics, SkippedFile, WebhookUrl,
};
use crate::provision::AlreadyMigrated;

pub const JSON_FILE: &str = "webhook_mappings.json";
pub const GUIDE_FILE: &str = "webhook_guide.txt";

/// File names listed per URL in the guide before collapsing the rest.
const GUIDE_FILE_LIMIT: usize = 5;
const RULE_WIDTH: usize = 80;

/// Everything a run produced, in serializable form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: String,
    pub statistics: RunStatistics,
    pub channels: Vec<ProvisionedChannel>,
    pub mappings: Vec<MappingEntry>,
    pub occurrences: BTreeMap<WebhookUrl, Vec<Occurrence>>,
    pub failures: Vec<ResourceFailure>,
    pub already_migrated: Vec<AlreadyMigrated>,
    pub skipped_files: Vec<SkippedFile>,
    pub backup_dir: Option<PathBuf>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(started: DateTime<Local>, statistics: RunStatistics) -> Self {
        Self {
            timestamp: started.to_rfc3339(),
            statistics,
            ..Default::default()
        }
    }

    pub fn with_mapping(mut self, mapping: &EndpointMapping) -> Self {
        self.mappings = mapping.entries();
        self
    }

    pub fn with_occurrences(mut self, occurrences: &OccurrenceIndex) -> Self {
        self.occurrences = occurrences.clone();
        self
    }

    /// Human-readable rendering, grouped by resource.
    pub fn render_guide(&self) -> String {
        Guide(self).to_string()
    }
}

/// Text guide for a [`RunReport`].
struct Guide<'a>(&'a RunReport);

impl fmt::Display for Guide<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let rule = "=".repeat(RULE_WIDTH);
        let stats = &report.statistics;

        writeln!(out, "{}", rule)?;
        writeln!(out, "WEBHOOK MAPPINGS")?;
        writeln!(out, "{}", rule)?;
        writeln!(out)?;
        writeln!(out, "Generated: {}", report.timestamp)?;
        writeln!(out)?;
        writeln!(out, "Scan Results:")?;
        writeln!(out, "  Files Scanned:        {}", stats.files_scanned)?;
        writeln!(out, "  Files with Webhooks:  {}", stats.files_with_matches)?;
        writeln!(out, "  Resources Found:      {}", stats.resources_found)?;
        writeln!(out, "  Total Webhooks:       {}", stats.webhooks_found)?;
        writeln!(out)?;
        writeln!(out, "Actions:")?;
        writeln!(out, "  Channels Created:     {}", stats.channels_created)?;
        writeln!(out, "  Channels Reused:      {}", stats.channels_reused)?;
        writeln!(out, "  New Webhooks:         {}", stats.endpoints_created)?;
        writeln!(out, "  Files Updated:        {}", stats.files_updated)?;
        writeln!(out, "  Replacements:         {}", stats.replacements)?;
        writeln!(out)?;
        writeln!(out, "{}", rule)?;

        let mut channels: Vec<&ProvisionedChannel> = report.channels.iter().collect();
        channels.sort_by(|a, b| a.resource.cmp(&b.resource));

        for channel in channels {
            writeln!(out)?;
            writeln!(out, "{}", rule)?;
            writeln!(out, "RESOURCE: {}", channel.resource)?;
            writeln!(out, "CHANNEL: #{}", channel.channel_name)?;
            writeln!(out, "WEBHOOKS: {}", channel.url_count)?;
            writeln!(out, "{}", rule)?;
            writeln!(out)?;

            let entries = report.mappings.iter().filter(|m| m.resource == channel.resource);
            for (idx, entry) in entries.enumerate() {
                writeln!(out, "Webhook {}:", idx + 1)?;
                writeln!(out, "  Old: {}", entry.old_url)?;
                writeln!(out, "  New: {}", entry.new_url)?;

                let files: Vec<&Occurrence> = report
                    .occurrences
                    .get(&entry.old_url)
                    .into_iter()
                    .flatten()
                    .filter(|o| o.resource == entry.resource)
                    .collect();
                if !files.is_empty() {
                    writeln!(out, "  Found in {} file(s):", files.len())?;
                    for occurrence in files.iter().take(GUIDE_FILE_LIMIT) {
                        writeln!(out, "    - {}", basename(&occurrence.path))?;
                    }
                    if files.len() > GUIDE_FILE_LIMIT {
                        writeln!(out, "    ... and {} more", files.len() - GUIDE_FILE_LIMIT)?;
                    }
                }
                writeln!(out)?;
            }
        }

        if !report.failures.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", rule)?;
            writeln!(out, "SKIPPED RESOURCES")?;
            writeln!(out, "{}", rule)?;
            for failure in &report.failures {
                writeln!(out, "  {}: {}", failure.resource, failure.reason)?;
            }
        }

        Ok(())
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write both renderings and return their paths.
    pub fn write(&self, report: &RunReport) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(&self.output_dir)?;

        let json_path = self.output_dir.join(JSON_FILE);
        fs::write(&json_path, serde_json::to_string_pretty(report)?)?;

        let guide_path = self.output_dir.join(GUIDE_FILE);
        fs::write(&guide_path, report.render_guide())?;

        Ok((json_path, guide_path))
    }
}
