//! Run configuration.
//!
//! Credentials and the scan root come from flags or the environment; tunables
//! come from an optional TOML settings file:
//!
//! ```toml
//! extensions = [".lua", ".json"]
//! skip_dirs = ["node_modules", ".git"]
//! channel_delay_ms = 1500
//! endpoint_delay_ms = 1000
//! create_backups = true
//! backup_dir = "webhook_backups"
//! output_dir = "webhook_output"
//! progress_every = 500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MigratorError, Result};

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".lua", ".js", ".ts", ".jsx", ".tsx", ".json", ".cfg", ".config", ".txt", ".md", ".env",
    ".xml", ".yml", ".yaml", ".ini", ".toml",
];

pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    "cache",
    "logs",
    ".idea",
    ".vscode",
    "dist",
    "build",
    "target",
    "obj",
    "bin",
];

/// Tunables, all optional in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extensions: Vec<String>,
    pub skip_dirs: Vec<String>,
    pub channel_delay_ms: u64,
    pub endpoint_delay_ms: u64,
    pub create_backups: bool,
    pub backup_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Emit a scan progress line every N files.
    pub progress_every: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
            channel_delay_ms: 1500,
            endpoint_delay_ms: 1000,
            create_backups: true,
            backup_dir: PathBuf::from("webhook_backups"),
            output_dir: PathBuf::from("webhook_output"),
            progress_every: 500,
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn scan(&self) -> ScanSettings {
        ScanSettings {
            extensions: self.extensions.iter().map(|e| e.to_lowercase()).collect(),
            skip_dirs: self.skip_dirs.iter().map(|d| d.to_lowercase()).collect(),
            progress_every: self.progress_every.max(1),
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            channel_delay: Duration::from_millis(self.channel_delay_ms),
            endpoint_delay: Duration::from_millis(self.endpoint_delay_ms),
        }
    }

    pub fn backup_dir(&self) -> Option<&Path> {
        self.create_backups.then_some(self.backup_dir.as_path())
    }
}

/// Locator and extractor settings, lower-cased once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub extensions: Vec<String>,
    pub skip_dirs: Vec<String>,
    pub progress_every: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Settings::default().scan()
    }
}

/// Delays between remote mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pacing {
    pub channel_delay: Duration,
    pub endpoint_delay: Duration,
}

/// Credentials for the Discord REST API.
#[derive(Clone, Default)]
pub struct Credentials {
    pub bot_token: String,
    pub guild_id: String,
    pub category_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"<redacted>")
            .field("guild_id", &self.guild_id)
            .field("category_id", &self.category_id)
            .finish()
    }
}

/// Everything one run needs, built once and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub credentials: Credentials,
    pub settings: Settings,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>, credentials: Credentials, settings: Settings) -> Self {
        Self {
            root: root.into(),
            credentials,
            settings,
        }
    }

    /// Check every field and report all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = self.validate_root();
        errors.extend(self.validate_credentials());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigratorError::Config(errors))
        }
    }

    /// Only the checks needed for a scan without remote calls.
    pub fn validate_for_scan(&self) -> Result<()> {
        let errors = self.validate_root();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigratorError::Config(errors))
        }
    }

    fn validate_root(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.root.as_os_str().is_empty() {
            errors.push("FIVEM_RESOURCES_PATH required".to_string());
        } else if !self.root.exists() {
            errors.push(format!("Resource path does not exist: {}", self.root.display()));
        } else if !self.root.is_dir() {
            errors.push(format!("Resource path is not a directory: {}", self.root.display()));
        }
        errors
    }

    fn validate_credentials(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let creds = &self.credentials;

        if creds.bot_token.trim().is_empty() {
            errors.push("DISCORD_BOT_TOKEN required".to_string());
        }

        for (name, value) in [
            ("DISCORD_GUILD_ID", &creds.guild_id),
            ("QB_LOGS_CATEGORY_ID", &creds.category_id),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{} required", name));
            } else if !value.trim().bytes().all(|b| b.is_ascii_digit()) {
                errors.push(format!("{} must be a numeric id, got '{}'", name, value));
            }
        }

        errors
    }
}
