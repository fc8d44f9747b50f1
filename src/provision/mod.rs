//! Remote provisioning: one channel per resource, one new endpoint per
//! discovered URL.
//!
//! Remote calls are strictly sequential with a pause after every mutation.
//! A failure inside one resource abandons that resource only; a missing
//! target category aborts the whole run.

pub mod discord;
pub mod naming;

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Pacing;
use crate::error::{MigratorError, Result};
use crate::models::{
    EndpointMapping, ProvisionedChannel, ResourceFailure, ResourceUrlIndex, RunStatistics,
    WebhookUrl,
};
use crate::progress::ProgressSink;

pub use discord::{DiscordClient, DiscordClientConfig};
pub use naming::{channel_name, endpoint_name, slugify};

/// Failure reported by the remote platform or while talking to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:.1}s)")]
    RateLimited { retry_after: f64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// A text channel inside the target category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChannel {
    pub id: String,
    pub name: String,
}

/// An existing endpoint on a channel. The URL is unknown when the platform
/// does not disclose the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub id: String,
    pub name: String,
}

/// Operations the provisioner needs from the messaging platform.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    async fn container_exists(&self, container_id: &str) -> std::result::Result<bool, PlatformError>;

    async fn list_channels(
        &self,
        container_id: &str,
    ) -> std::result::Result<Vec<RemoteChannel>, PlatformError>;

    async fn create_channel(
        &self,
        container_id: &str,
        name: &str,
    ) -> std::result::Result<RemoteChannel, PlatformError>;

    async fn list_endpoints(
        &self,
        channel_id: &str,
    ) -> std::result::Result<Vec<RemoteEndpoint>, PlatformError>;

    async fn create_endpoint(
        &self,
        channel_id: &str,
        name: &str,
    ) -> std::result::Result<WebhookUrl, PlatformError>;
}

/// A discovered URL that already is an endpoint of its resource's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlreadyMigrated {
    pub resource: String,
    pub url: WebhookUrl,
}

#[derive(Debug, Default)]
pub struct ProvisionOutcome {
    pub mapping: EndpointMapping,
    pub channels: Vec<ProvisionedChannel>,
    pub failures: Vec<ResourceFailure>,
    pub already_migrated: Vec<AlreadyMigrated>,
    pub cancelled: bool,
}

impl ProvisionOutcome {
    pub fn channels_created(&self) -> usize {
        self.channels.iter().filter(|c| !c.reused).count()
    }

    pub fn channels_reused(&self) -> usize {
        self.channels.iter().filter(|c| c.reused).count()
    }

    pub fn record(&self, stats: &mut RunStatistics) {
        stats.channels_created += self.channels_created();
        stats.channels_reused += self.channels_reused();
        stats.endpoints_created += self.mapping.len();
        stats.already_migrated += self.already_migrated.len();
    }
}

/// Everything provisioned for one resource, committed only if every remote
/// call for it succeeded.
struct ResourcePlan {
    channel: ProvisionedChannel,
    mapping: EndpointMapping,
    already_migrated: Vec<AlreadyMigrated>,
}

pub struct Provisioner<'a, P: MessagingPlatform + ?Sized> {
    platform: &'a P,
    pacing: Pacing,
    sink: &'a dyn ProgressSink,
}

impl<'a, P: MessagingPlatform + ?Sized> Provisioner<'a, P> {
    pub fn new(platform: &'a P, pacing: Pacing, sink: &'a dyn ProgressSink) -> Self {
        Self {
            platform,
            pacing,
            sink,
        }
    }

    /// Provision every resource in lexicographic order.
    pub async fn provision(
        &self,
        index: &ResourceUrlIndex,
        container_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome> {
        if !self.platform.container_exists(container_id).await? {
            self.sink.emit("Target category not found, aborting");
            return Err(MigratorError::ContainerNotFound(container_id.to_string()));
        }

        let mut outcome = ProvisionOutcome::default();
        let total = index.len();

        let mut known_channels = match self.existing_channels(container_id).await {
            Ok(channels) => channels,
            Err(e) => {
                tracing::warn!("Listing channels failed: {}", e);
                self.sink
                    .emit(&format!("Could not list channels, skipping all {} resources", total));
                outcome.failures = index
                    .iter()
                    .map(|(resource, _)| ResourceFailure {
                        resource: resource.clone(),
                        reason: format!("listing channels failed: {}", e),
                    })
                    .collect();
                return Ok(outcome);
            }
        };
        self.sink
            .emit(&format!("Provisioning {} channels (one per resource)", total));

        for (idx, (resource, urls)) in index.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                self.sink.emit("Provisioning cancelled");
                break;
            }

            let step = format!("[{}/{}]", idx + 1, total);
            match self
                .provision_resource(resource, urls, container_id, &mut known_channels)
                .await
            {
                Ok(plan) => {
                    let verb = if plan.channel.reused { "Reusing" } else { "Created" };
                    self.sink.emit(&format!(
                        "{} {} #{} ({} webhooks, {} new, {} already migrated)",
                        step,
                        verb,
                        plan.channel.channel_name,
                        plan.channel.url_count,
                        plan.mapping.len(),
                        plan.already_migrated.len()
                    ));
                    outcome.channels.push(plan.channel);
                    outcome.mapping.extend(plan.mapping);
                    outcome.already_migrated.extend(plan.already_migrated);
                }
                Err(e) => {
                    tracing::warn!("Provisioning {} failed: {}", resource, e);
                    self.sink
                        .emit(&format!("{} Skipped {}: {}", step, resource, e));
                    outcome.failures.push(ResourceFailure {
                        resource: resource.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Channels already in the container, with one retry.
    async fn existing_channels(
        &self,
        container_id: &str,
    ) -> std::result::Result<Vec<RemoteChannel>, PlatformError> {
        match self.platform.list_channels(container_id).await {
            Ok(channels) => Ok(channels),
            Err(e) => {
                tracing::debug!("Listing channels failed, retrying: {}", e);
                self.pause(self.pacing.channel_delay).await;
                self.platform.list_channels(container_id).await
            }
        }
    }

    async fn provision_resource(
        &self,
        resource: &str,
        urls: &BTreeSet<WebhookUrl>,
        container_id: &str,
        known_channels: &mut Vec<RemoteChannel>,
    ) -> std::result::Result<ResourcePlan, PlatformError> {
        let name = channel_name(resource);

        let existing = known_channels.iter().find(|c| c.name == name).cloned();
        let (channel, reused) = match existing {
            Some(channel) => (channel, true),
            None => {
                let channel = self.platform.create_channel(container_id, &name).await?;
                known_channels.push(channel.clone());
                self.pause(self.pacing.channel_delay).await;
                (channel, false)
            }
        };

        let existing_ids: HashSet<String> = if reused {
            self.platform
                .list_endpoints(&channel.id)
                .await?
                .into_iter()
                .map(|e| e.id)
                .collect()
        } else {
            HashSet::new()
        };

        let mut mapping = EndpointMapping::new();
        let mut already_migrated = Vec::new();

        for (position, old) in urls.iter().enumerate() {
            if existing_ids.contains(old.id()) {
                already_migrated.push(AlreadyMigrated {
                    resource: resource.to_string(),
                    url: old.clone(),
                });
                continue;
            }

            let endpoint = endpoint_name(resource, position + 1, urls.len());
            let new = self.platform.create_endpoint(&channel.id, &endpoint).await?;
            tracing::debug!("{}: webhook {} -> {}", resource, old.id(), new.id());
            mapping.insert(resource, old.clone(), new);
            self.pause(self.pacing.endpoint_delay).await;
        }

        Ok(ResourcePlan {
            channel: ProvisionedChannel {
                resource: resource.to_string(),
                channel_id: channel.id,
                channel_name: name,
                url_count: urls.len(),
                reused,
            },
            mapping,
            already_migrated,
        })
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
