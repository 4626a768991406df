use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use super::backend::NotifyBackend;
use crate::error::StoreResult;
use crate::store::KvStore;

/// Chat platforms reject messages above this many characters.
pub const MESSAGE_LIMIT: usize = 2000;

const GUILDS_KEY: &str = "bot:guilds";

fn channel_key(guild_id: &str) -> String {
    format!("discord:{guild_id}:broadcast_channel")
}

/// Delivers one message part to one channel webhook.
#[async_trait]
pub trait ChannelPoster: Send + Sync {
    async fn post(&self, webhook_url: &str, content: &str) -> anyhow::Result<()>;
}

/// Chat webhook POST with a `{"content": ...}` body.
#[derive(Default)]
pub struct WebhookPoster {
    http: reqwest::Client,
}

#[async_trait]
impl ChannelPoster for WebhookPoster {
    async fn post(&self, webhook_url: &str, content: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(webhook_url)
            .json(&json!({ "content": content }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("channel webhook returned {status}: {body}");
        }
        Ok(())
    }
}

/// Per-guild broadcast registry. Each guild registers one channel webhook;
/// `send` fans a message out to every guild that has one.
pub struct GuildBroadcast {
    store: Arc<dyn KvStore>,
    poster: Arc<dyn ChannelPoster>,
}

impl GuildBroadcast {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_poster(store, Arc::new(WebhookPoster::default()))
    }

    pub fn with_poster(store: Arc<dyn KvStore>, poster: Arc<dyn ChannelPoster>) -> Self {
        Self { store, poster }
    }

    pub async fn register_guild(&self, guild_id: &str) -> StoreResult<()> {
        self.store.set_add(GUILDS_KEY, guild_id).await
    }

    pub async fn remove_guild(&self, guild_id: &str) -> StoreResult<()> {
        self.store.set_remove(GUILDS_KEY, guild_id).await
    }

    pub async fn guilds(&self) -> StoreResult<HashSet<String>> {
        self.store.set_members(GUILDS_KEY).await
    }

    pub async fn set_broadcast_channel(&self, guild_id: &str, webhook_url: &str) -> StoreResult<()> {
        self.store
            .set(&channel_key(guild_id), webhook_url.as_bytes())
            .await
    }

    pub async fn broadcast_channel(&self, guild_id: &str) -> StoreResult<Option<String>> {
        let value = self.store.get(&channel_key(guild_id)).await?;
        Ok(value
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .filter(|url| !url.is_empty()))
    }
}

#[async_trait]
impl NotifyBackend for GuildBroadcast {
    async fn send(&self, message: &str) -> anyhow::Result<()> {
        let guilds = match self.guilds().await {
            Ok(guilds) => guilds,
            Err(e) => {
                warn!(error = %e, "Failed to load registered guilds");
                return Ok(());
            }
        };

        let chunks = split_message(message, MESSAGE_LIMIT);
        let mut guilds: Vec<String> = guilds.into_iter().collect();
        guilds.sort();
        for guild_id in guilds {
            let webhook_url = match self.broadcast_channel(&guild_id).await {
                Ok(Some(url)) => url,
                Ok(None) => {
                    warn!(guild = %guild_id, "Guild has not set up a broadcast channel");
                    continue;
                }
                Err(e) => {
                    warn!(guild = %guild_id, error = %e, "Failed to read broadcast channel");
                    continue;
                }
            };

            let mut delivered = 0;
            for chunk in &chunks {
                if let Err(e) = self.poster.post(&webhook_url, chunk).await {
                    warn!(guild = %guild_id, error = %e, "Failed to broadcast to guild");
                    break;
                }
                delivered += 1;
            }
            debug!(guild = %guild_id, parts = chunks.len(), delivered, "Broadcast finished");
        }

        Ok(())
    }
}

/// Split on line boundaries so each part stays within `limit` characters.
/// A single line longer than `limit` is cut at character boundaries.
pub fn split_message(message: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in message.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                parts.push(piece.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
