//! Discord REST client, plus the `ChatApi` seam both background
//! subsystems talk to the platform through.

pub mod api;

use crate::discord::api::{
    ActiveThreads, AllowedMentions, Channel, GuildMember, Message, OutgoingMessage,
    SUPPRESS_NOTIFICATIONS,
};
use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::env;
use std::sync::OnceLock;

/// Every platform call the schedule engine and the enroller make.
///
/// Implemented for real by [`DiscordClient`]; tests substitute a
/// recording double so neither subsystem needs the network.
#[async_trait]
pub trait ChatApi: Send + Sync {
    // Scheduled messages
    async fn fetch_channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>>;
    async fn send_message(&self, channel_id: &str, content: &str) -> anyhow::Result<Message>;

    // Enrollment
    async fn join_thread(&self, thread_id: &str) -> anyhow::Result<()>;
    /// Creates a post in a thread with suppressed notifications.
    async fn create_post(
        &self,
        thread_id: &str,
        content: &str,
        allowed: AllowedMentions,
    ) -> anyhow::Result<Message>;
    /// Rewrites an existing post's content, keeping notifications
    /// suppressed.
    async fn edit_post(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
        allowed: AllowedMentions,
    ) -> anyhow::Result<Message>;
    /// Fetches up to `limit` of a channel's oldest messages, oldest
    /// first.
    async fn fetch_messages(&self, channel_id: &str, limit: u8) -> anyhow::Result<Vec<Message>>;
    async fn fetch_guild_members(&self, guild_id: &str) -> anyhow::Result<Vec<GuildMember>>;
    async fn fetch_active_threads(&self, guild_id: &str) -> anyhow::Result<Vec<Channel>>;
}

#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    api_url: String,
    // The token is loaded lazily, to avoid requiring it when the API
    // is not actually accessed.
    bot_token: OnceLock<String>,
}

impl DiscordClient {
    pub fn new_from_env() -> Self {
        let api_url =
            env::var("DISCORD_API_URL").unwrap_or("https://discord.com/api/v10".into());
        Self::new(api_url)
    }

    fn new(api_url: String) -> Self {
        DiscordClient {
            client: Client::new(),
            api_url,
            bot_token: OnceLock::new(),
        }
    }

    fn make_request(&self, method: Method, path: &str) -> RequestBuilder {
        let token = self.get_bot_token();
        self.client
            .request(method, format!("{}/{path}", self.api_url))
            .header("Authorization", format!("Bot {token}"))
    }

    fn get_bot_token(&self) -> &str {
        self.bot_token
            .get_or_init(|| env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN is missing"))
            .as_ref()
    }
}

#[async_trait]
impl ChatApi for DiscordClient {
    async fn fetch_channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>> {
        let response = self
            .make_request(Method::GET, &format!("channels/{channel_id}"))
            .send()
            .await
            .with_context(|| format!("fail fetching channel {channel_id}"))?;
        // An unknown or inaccessible channel is an expected outcome,
        // not an API failure.
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }
        Ok(Some(deserialize_response(response).await?))
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> anyhow::Result<Message> {
        let response = self
            .make_request(Method::POST, &format!("channels/{channel_id}/messages"))
            .json(&OutgoingMessage {
                content,
                allowed_mentions: None,
                flags: None,
            })
            .send()
            .await
            .with_context(|| format!("fail sending message to channel {channel_id}"))?;
        deserialize_response(response).await
    }

    async fn join_thread(&self, thread_id: &str) -> anyhow::Result<()> {
        let response = self
            .make_request(
                Method::PUT,
                &format!("channels/{thread_id}/thread-members/@me"),
            )
            .send()
            .await
            .with_context(|| format!("fail joining thread {thread_id}"))?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("joining thread {thread_id} failed: {body}");
        }
        Ok(())
    }

    async fn create_post(
        &self,
        thread_id: &str,
        content: &str,
        allowed: AllowedMentions,
    ) -> anyhow::Result<Message> {
        let response = self
            .make_request(Method::POST, &format!("channels/{thread_id}/messages"))
            .json(&OutgoingMessage {
                content,
                allowed_mentions: Some(allowed),
                flags: Some(SUPPRESS_NOTIFICATIONS),
            })
            .send()
            .await
            .with_context(|| format!("fail posting in thread {thread_id}"))?;
        deserialize_response(response).await
    }

    async fn edit_post(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
        allowed: AllowedMentions,
    ) -> anyhow::Result<Message> {
        let response = self
            .make_request(
                Method::PATCH,
                &format!("channels/{channel_id}/messages/{message_id}"),
            )
            .json(&OutgoingMessage {
                content,
                allowed_mentions: Some(allowed),
                flags: Some(SUPPRESS_NOTIFICATIONS),
            })
            .send()
            .await
            .with_context(|| format!("fail editing message {message_id} in {channel_id}"))?;
        deserialize_response(response).await
    }

    async fn fetch_messages(&self, channel_id: &str, limit: u8) -> anyhow::Result<Vec<Message>> {
        let response = self
            .make_request(
                Method::GET,
                &format!("channels/{channel_id}/messages?after=0&limit={limit}"),
            )
            .send()
            .await
            .with_context(|| format!("fail fetching messages of channel {channel_id}"))?;
        let mut messages: Vec<Message> = deserialize_response(response).await?;
        // The API does not guarantee ordering across pagination
        // modes; callers want thread history in reading order, and
        // snowflake ids sort by creation time.
        messages.sort_by_key(|m| m.id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(messages)
    }

    async fn fetch_guild_members(&self, guild_id: &str) -> anyhow::Result<Vec<GuildMember>> {
        const PAGE_SIZE: usize = 1000;

        let mut members = Vec::new();
        let mut after = String::from("0");
        loop {
            let response = self
                .make_request(
                    Method::GET,
                    &format!("guilds/{guild_id}/members?limit={PAGE_SIZE}&after={after}"),
                )
                .send()
                .await
                .with_context(|| format!("fail fetching members of guild {guild_id}"))?;
            let page: Vec<GuildMember> = deserialize_response(response).await?;
            let full_page = page.len() == PAGE_SIZE;
            if let Some(last) = page.last() {
                after = last.user.id.clone();
            }
            members.extend(page);
            if !full_page {
                return Ok(members);
            }
        }
    }

    async fn fetch_active_threads(&self, guild_id: &str) -> anyhow::Result<Vec<Channel>> {
        let response = self
            .make_request(Method::GET, &format!("guilds/{guild_id}/threads/active"))
            .send()
            .await
            .with_context(|| format!("fail fetching active threads of guild {guild_id}"))?;
        let active: ActiveThreads = deserialize_response(response).await?;
        Ok(active.threads)
    }
}

async fn deserialize_response<T>(response: Response) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.context("Discord API request failed")?;
        Err(anyhow::anyhow!("Discord API returned {status}: {body}"))
    } else {
        Ok(response.json::<T>().await.with_context(|| {
            anyhow::anyhow!(
                "Failed to deserialize value of type {}",
                std::any::type_name::<T>()
            )
        })?)
    }
}
