use crate::dispatcher::{ChannelId, ChatTransport};
use crate::formatter::NotificationPayload;
use crate::http::{self, HttpError};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

// Guild text and announcement channels.
const MESSAGEABLE_CHANNEL_TYPES: [u8; 2] = [0, 5];

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    name: Option<String>,
}

/// Discord bot REST client with a name → channel id cache.
pub struct DiscordClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    retry: RetryPolicy,
    channels: RwLock<HashMap<String, ChannelId>>,
}

impl DiscordClient {
    pub fn new(token: &str, retry: RetryPolicy) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, token, retry)
    }

    pub fn with_api_url(api_url: &str, token: &str, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            http: http::build_client()?,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry,
            channels: RwLock::new(HashMap::new()),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.api_url, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        http::fetch_json(&self.retry, path, || self.request(reqwest::Method::GET, path)).await
    }

    /// Reloads the channel cache from every guild the bot is in and returns the
    /// number of channels cached.
    pub async fn refresh_channels(&self) -> Result<usize> {
        let guilds: Vec<Guild> = self
            .get("users/@me/guilds")
            .await
            .context("Failed to list Discord guilds")?;

        let mut channels = HashMap::new();
        for guild in guilds {
            let guild_channels: Vec<Channel> =
                match self.get(&format!("guilds/{}/channels", guild.id)).await {
                    Ok(list) => list,
                    Err(e) => {
                        warn!("Failed to list channels of guild {} ({}): {}", guild.name, guild.id, e);
                        continue;
                    }
                };
            cache_channels(&mut channels, guild_channels);
        }

        let count = channels.len();
        *self.channels.write().await = channels;
        info!("Cached {} Discord channel(s)", count);
        Ok(count)
    }

    #[cfg(test)]
    async fn insert_channel(&self, name: &str, id: &str) {
        self.channels
            .write()
            .await
            .insert(name.to_string(), id.to_string());
    }
}

fn cache_channels(cache: &mut HashMap<String, ChannelId>, channels: Vec<Channel>) {
    for channel in channels {
        if !MESSAGEABLE_CHANNEL_TYPES.contains(&channel.kind) {
            continue;
        }
        if let Some(name) = channel.name {
            // First match wins, like a linear scan over the cache would.
            cache.entry(name).or_insert(channel.id);
        }
    }
}

pub fn embed(payload: &NotificationPayload) -> Value {
    let fields: Vec<Value> = payload
        .fields
        .iter()
        .map(|field| {
            json!({
                "name": field.label,
                "value": field.value,
                "inline": field.inline,
            })
        })
        .collect();

    json!({
        "title": payload.title,
        "color": payload.color,
        "url": payload.link_url,
        "fields": fields,
        "author": {
            "name": payload.author_label,
            "url": payload.author_link_url,
        },
        "thumbnail": { "url": payload.image_url },
        "timestamp": payload.timestamp.to_rfc3339(),
    })
}

#[async_trait]
impl ChatTransport for DiscordClient {
    async fn resolve(&self, name: &str) -> Option<ChannelId> {
        self.channels.read().await.get(name).cloned()
    }

    async fn send(&self, channel: &ChannelId, payload: &NotificationPayload) -> Result<()> {
        let body = json!({ "embeds": [embed(payload)] });
        let path = format!("channels/{channel}/messages");
        http::send_with_retry(&self.retry, &path, || {
            self.request(reqwest::Method::POST, &path).json(&body)
        })
        .await
        .with_context(|| format!("Failed to post message to channel {channel}"))?;
        debug!("Posted message to channel {}", channel);
        Ok(())
    }
}
