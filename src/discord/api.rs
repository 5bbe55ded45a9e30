//! The subset of Discord REST API objects the bot reads and writes.

use serde::{Deserialize, Serialize};

/// Channel type codes, per the Discord channel object.
pub const GUILD_TEXT: u8 = 0;
pub const GUILD_ANNOUNCEMENT: u8 = 5;
pub const ANNOUNCEMENT_THREAD: u8 = 10;
pub const PUBLIC_THREAD: u8 = 11;
pub const PRIVATE_THREAD: u8 = 12;

/// Message flag suppressing push and desktop notifications for a
/// single message.
pub const SUPPRESS_NOTIFICATIONS: u64 = 1 << 12;

/// Content of a marker post while it is not carrying a mention
/// batch: a zero-width space, which renders as an empty message.
pub const PLACEHOLDER: &str = "\u{200b}";

#[derive(Clone, Debug, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl Channel {
    /// Whether plain text messages can be sent into this channel.
    pub fn is_text_capable(&self) -> bool {
        matches!(
            self.kind,
            GUILD_TEXT
                | GUILD_ANNOUNCEMENT
                | ANNOUNCEMENT_THREAD
                | PUBLIC_THREAD
                | PRIVATE_THREAD
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub author: User,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GuildMember {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ActiveThreads {
    pub threads: Vec<Channel>,
}

/// Explicit allow-list controlling which mentions in a message's
/// content actually resolve to pings. An empty `parse` disables all
/// broader mention parsing (@everyone, roles).
#[derive(Clone, Debug, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    pub users: Vec<String>,
}

impl AllowedMentions {
    pub fn none() -> Self {
        AllowedMentions {
            parse: Vec::new(),
            users: Vec::new(),
        }
    }

    /// Allow-list restricted to exactly the given user ids.
    pub fn for_users(ids: &[String]) -> Self {
        AllowedMentions {
            parse: Vec::new(),
            users: ids.to_vec(),
        }
    }
}

/// Body shared by message create and edit calls.
#[derive(Debug, Serialize)]
pub struct OutgoingMessage<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}
