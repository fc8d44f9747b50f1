#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use webhook_migrator::{
    Config, Credentials, MessagingPlatform, PlatformError, RemoteChannel, RemoteEndpoint,
    Settings, WebhookUrl,
};

pub const GUILD: &str = "800000000000000001";
pub const CATEGORY: &str = "900000000000000001";

pub fn old_url(n: u64) -> String {
    let token: String = "0ldT0k-_".chars().cycle().take(68).collect();
    format!(
        "https://discord.com/api/webhooks/{:018}/{}",
        100_000_000_000_000_000u64 + n,
        token
    )
}

#[derive(Default)]
struct State {
    channels: Vec<RemoteChannel>,
    endpoints: BTreeMap<String, Vec<RemoteEndpoint>>,
    next_id: u64,
    channels_created: usize,
    endpoints_created: usize,
}

/// In-memory stand-in for the Discord API that persists across runs.
#[derive(Default)]
pub struct MemoryPlatform {
    state: Mutex<State>,
    pub missing_category: bool,
    /// Channel names whose endpoint creation is rejected.
    pub failing_channels: Vec<String>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_category() -> Self {
        Self {
            missing_category: true,
            ..Self::default()
        }
    }

    pub fn failing_on(channel: &str) -> Self {
        Self {
            failing_channels: vec![channel.to_string()],
            ..Self::default()
        }
    }

    pub fn channels_created(&self) -> usize {
        self.state.lock().unwrap().channels_created
    }

    pub fn endpoints_created(&self) -> usize {
        self.state.lock().unwrap().endpoints_created
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }
}

#[async_trait]
impl MessagingPlatform for MemoryPlatform {
    async fn container_exists(&self, container_id: &str) -> Result<bool, PlatformError> {
        Ok(!self.missing_category && container_id == CATEGORY)
    }

    async fn list_channels(&self, _: &str) -> Result<Vec<RemoteChannel>, PlatformError> {
        Ok(self.state.lock().unwrap().channels.clone())
    }

    async fn create_channel(&self, _: &str, name: &str) -> Result<RemoteChannel, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let channel = RemoteChannel {
            id: format!("{:018}", 300_000_000_000_000_000u64 + state.next_id),
            name: name.to_string(),
        };
        state.channels.push(channel.clone());
        state.channels_created += 1;
        Ok(channel)
    }

    async fn list_endpoints(&self, channel_id: &str) -> Result<Vec<RemoteEndpoint>, PlatformError> {
        let state = self.state.lock().unwrap();
        Ok(state.endpoints.get(channel_id).cloned().unwrap_or_default())
    }

    async fn create_endpoint(&self, channel_id: &str, name: &str) -> Result<WebhookUrl, PlatformError> {
        let mut state = self.state.lock().unwrap();
        let failing = state
            .channels
            .iter()
            .any(|c| c.id == channel_id && self.failing_channels.contains(&c.name));
        if failing {
            return Err(PlatformError::Remote {
                status: 403,
                message: "Missing Permissions".to_string(),
            });
        }

        state.next_id += 1;
        let id = format!("{:018}", 500_000_000_000_000_000u64 + state.next_id);
        state
            .endpoints
            .entry(channel_id.to_string())
            .or_default()
            .push(RemoteEndpoint {
                id: id.clone(),
                name: name.to_string(),
            });
        state.endpoints_created += 1;

        let token: String = "N3wT0k_-".chars().cycle().take(68).collect();
        WebhookUrl::parse(&format!("https://discord.com/api/webhooks/{}/{}", id, token))
            .ok_or_else(|| PlatformError::InvalidResponse("bad fake url".to_string()))
    }
}

/// A resource tree plus a separate directory for backups and reports.
pub struct Fixture {
    pub root: TempDir,
    pub work: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
            work: TempDir::new().unwrap(),
        }
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root.path().join(relative)).unwrap()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.work.path().join("out")
    }

    pub fn backup_root(&self) -> PathBuf {
        self.work.path().join("backups")
    }

    pub fn settings(&self) -> Settings {
        Settings {
            channel_delay_ms: 0,
            endpoint_delay_ms: 0,
            backup_dir: self.backup_root(),
            output_dir: self.output_dir(),
            ..Settings::default()
        }
    }

    pub fn config(&self) -> Config {
        self.config_with(self.settings())
    }

    pub fn config_with(&self, settings: Settings) -> Config {
        Config::new(
            self.root.path(),
            Credentials {
                bot_token: "bot-token".to_string(),
                guild_id: GUILD.to_string(),
                category_id: CATEGORY.to_string(),
            },
            settings,
        )
    }
}

pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(files_under(&path));
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
