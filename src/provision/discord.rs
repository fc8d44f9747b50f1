use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{MessagingPlatform, PlatformError, RemoteChannel, RemoteEndpoint};
use crate::models::WebhookUrl;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const WEBHOOK_BASE: &str = "https://discord.com/api/webhooks";

const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_CATEGORY: u8 = 4;

/// Longest server-requested wait honoured before giving up on a request.
const MAX_RETRY_AFTER: f64 = 30.0;

/// Runtime configuration for the Discord REST client.
#[derive(Clone)]
pub struct DiscordClientConfig {
    pub bot_token: String,
    pub guild_id: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl DiscordClientConfig {
    pub fn new(bot_token: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            guild_id: guild_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct DiscordClient {
    config: DiscordClientConfig,
    http: reqwest::Client,
}

impl DiscordClient {
    pub fn new(config: DiscordClientConfig) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("webhook-migrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Transport(format!("failed to build http client: {}", e)))?;

        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn guild_channels(&self) -> Result<Vec<ChannelPayload>, PlatformError> {
        let path = format!("guilds/{}/channels", self.config.guild_id);
        self.request(Method::GET, &path, None::<&()>).await
    }

    /// Send a request, waiting out one rate limit response if the server
    /// asks for a reasonable delay.
    async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, PlatformError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let mut retried = false;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", format!("Bot {}", self.config.bot_token));
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    PlatformError::Transport(format!(
                        "{} {} timed out after {:?}",
                        method, path, self.config.timeout
                    ))
                } else {
                    PlatformError::Transport(format!("{} {} failed: {}", method, path, e))
                }
            })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| PlatformError::Transport(format!("failed to read response body: {}", e)))?;

            if status.as_u16() == 429 {
                let retry_after = parse_retry_after(&text);
                if !retried && retry_after <= MAX_RETRY_AFTER {
                    tracing::warn!("Rate limited on {} {}, retrying in {:.1}s", method, path, retry_after);
                    tokio::time::sleep(Duration::from_secs_f64(retry_after.max(0.0))).await;
                    retried = true;
                    continue;
                }
                return Err(PlatformError::RateLimited { retry_after });
            }

            if !status.is_success() {
                return Err(PlatformError::Remote {
                    status: status.as_u16(),
                    message: error_message(&text),
                });
            }

            return serde_json::from_str(&text).map_err(|e| {
                PlatformError::InvalidResponse(format!("{} (body={})", e, truncate_for_error(&text)))
            });
        }
    }
}

#[async_trait]
impl MessagingPlatform for DiscordClient {
    async fn container_exists(&self, container_id: &str) -> Result<bool, PlatformError> {
        let channels = self.guild_channels().await?;
        Ok(channels
            .iter()
            .any(|c| c.id == container_id && c.kind == CHANNEL_TYPE_CATEGORY))
    }

    async fn list_channels(&self, container_id: &str) -> Result<Vec<RemoteChannel>, PlatformError> {
        let channels = self.guild_channels().await?;
        Ok(channels
            .into_iter()
            .filter(|c| c.kind == CHANNEL_TYPE_TEXT && c.parent_id.as_deref() == Some(container_id))
            .map(|c| RemoteChannel {
                id: c.id,
                name: c.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_channel(&self, container_id: &str, name: &str) -> Result<RemoteChannel, PlatformError> {
        let path = format!("guilds/{}/channels", self.config.guild_id);
        let body = CreateChannelRequest {
            name,
            kind: CHANNEL_TYPE_TEXT,
            parent_id: container_id,
        };
        let created: ChannelPayload = self.request(Method::POST, &path, Some(&body)).await?;
        Ok(RemoteChannel {
            id: created.id,
            name: created.name.unwrap_or_else(|| name.to_string()),
        })
    }

    async fn list_endpoints(&self, channel_id: &str) -> Result<Vec<RemoteEndpoint>, PlatformError> {
        let path = format!("channels/{}/webhooks", channel_id);
        let hooks: Vec<WebhookPayload> = self.request(Method::GET, &path, None::<&()>).await?;
        Ok(hooks
            .into_iter()
            .map(|h| RemoteEndpoint {
                id: h.id,
                name: h.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_endpoint(&self, channel_id: &str, name: &str) -> Result<WebhookUrl, PlatformError> {
        let path = format!("channels/{}/webhooks", channel_id);
        let hook: WebhookPayload = self
            .request(Method::POST, &path, Some(&CreateWebhookRequest { name }))
            .await?;
        webhook_url(&hook)
    }
}

fn webhook_url(hook: &WebhookPayload) -> Result<WebhookUrl, PlatformError> {
    let token = hook
        .token
        .as_deref()
        .ok_or_else(|| PlatformError::InvalidResponse(format!("webhook {} has no token", hook.id)))?;
    let url = format!("{}/{}/{}", WEBHOOK_BASE, hook.id, token);
    WebhookUrl::parse(&url)
        .ok_or_else(|| PlatformError::InvalidResponse(format!("webhook {} produced a malformed url", hook.id)))
}

fn parse_retry_after(body: &str) -> f64 {
    serde_json::from_str::<RateLimitPayload>(body)
        .map(|r| r.retry_after)
        .unwrap_or(MAX_RETRY_AFTER + 1.0)
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(err) => match err.code {
            Some(code) => format!("{} (code {})", err.message, code),
            None => err.message,
        },
        Err(_) => truncate_for_error(body),
    }
}

fn truncate_for_error(value: &str) -> String {
    const LIMIT: usize = 400;
    if value.len() <= LIMIT {
        value.to_string()
    } else {
        let mut end = LIMIT;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &value[..end])
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateChannelRequest<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    parent_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct CreateWebhookRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelPayload {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookPayload {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RateLimitPayload {
    retry_after: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorPayload {
    message: String,
    #[serde(default)]
    code: Option<u64>,
}
