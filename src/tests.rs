//! Utility code to help writing heraldbot tests: an in-memory
//! `ChatApi` double that records every platform call so tests can
//! assert on exactly what was sent, created and edited.

use crate::discord::api::{AllowedMentions, Channel, GuildMember, Message, User, PUBLIC_THREAD};
use crate::discord::ChatApi;
use crate::handlers::Context;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// User id the fake platform assigns to the bot's own account.
pub const BOT_USER_ID: &str = "100";

/// A recorded message edit: channel id, message id, new content and
/// the allowed-mentions user allow-list it was sent with.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEdit {
    pub channel_id: String,
    pub message_id: String,
    pub content: String,
    pub allowed_users: Vec<String>,
}

#[derive(Default)]
pub struct RecordingApi {
    /// Channels the fake platform knows about; fetching any other id
    /// resolves to `None`.
    pub channels: Mutex<Vec<Channel>>,
    /// Plain sends, as `(channel_id, content)`.
    pub sent: Mutex<Vec<(String, String)>>,
    /// Posts created in threads, in creation order. Doubles as the
    /// message history served by `fetch_messages`.
    pub posts: Mutex<Vec<Message>>,
    pub edits: Mutex<Vec<RecordedEdit>>,
    pub joins: Mutex<Vec<String>>,
    pub members: Mutex<Vec<GuildMember>>,
    pub active_threads: Mutex<Vec<Channel>>,
    /// Channel ids whose sends and edits fail.
    pub failing_channels: Mutex<Vec<String>>,
    pub fail_joins: Mutex<bool>,
    next_id: AtomicU64,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingApi {
            next_id: AtomicU64::new(1000),
            ..Default::default()
        })
    }

    pub fn add_channel(&self, id: &str, kind: u8) {
        self.channels.lock().unwrap().push(Channel {
            id: id.to_string(),
            kind,
        });
    }

    pub fn add_member(&self, user_id: &str, bot: bool) {
        self.members.lock().unwrap().push(GuildMember {
            user: User {
                id: user_id.to_string(),
                bot,
            },
        });
    }

    pub fn add_active_thread(&self, thread_id: &str) {
        self.active_threads.lock().unwrap().push(Channel {
            id: thread_id.to_string(),
            kind: PUBLIC_THREAD,
        });
    }

    /// Seeds a message into a thread's history, e.g. a marker post
    /// left over from an earlier enrollment.
    pub fn seed_post(&self, thread_id: &str, author_id: &str) -> Message {
        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            channel_id: thread_id.to_string(),
            author: User {
                id: author_id.to_string(),
                bot: author_id == BOT_USER_ID,
            },
        };
        self.posts.lock().unwrap().push(message.clone());
        message
    }

    fn fails(&self, channel_id: &str) -> bool {
        self.failing_channels
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == channel_id)
    }
}

#[async_trait]
impl ChatApi for RecordingApi {
    async fn fetch_channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == channel_id)
            .cloned())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> anyhow::Result<Message> {
        if self.fails(channel_id) {
            anyhow::bail!("send to {channel_id} failed");
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok(Message {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            channel_id: channel_id.to_string(),
            author: User {
                id: BOT_USER_ID.to_string(),
                bot: true,
            },
        })
    }

    async fn join_thread(&self, thread_id: &str) -> anyhow::Result<()> {
        self.joins.lock().unwrap().push(thread_id.to_string());
        if *self.fail_joins.lock().unwrap() {
            anyhow::bail!("already a member of {thread_id}");
        }
        Ok(())
    }

    async fn create_post(
        &self,
        thread_id: &str,
        content: &str,
        allowed: AllowedMentions,
    ) -> anyhow::Result<Message> {
        if self.fails(thread_id) {
            anyhow::bail!("post in {thread_id} failed");
        }
        let message = self.seed_post(thread_id, BOT_USER_ID);
        self.edits.lock().unwrap().push(RecordedEdit {
            channel_id: thread_id.to_string(),
            message_id: message.id.clone(),
            content: content.to_string(),
            allowed_users: allowed.users,
        });
        Ok(message)
    }

    async fn edit_post(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
        allowed: AllowedMentions,
    ) -> anyhow::Result<Message> {
        if self.fails(channel_id) {
            anyhow::bail!("edit of {message_id} in {channel_id} failed");
        }
        self.edits.lock().unwrap().push(RecordedEdit {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            content: content.to_string(),
            allowed_users: allowed.users,
        });
        Ok(Message {
            id: message_id.to_string(),
            channel_id: channel_id.to_string(),
            author: User {
                id: BOT_USER_ID.to_string(),
                bot: true,
            },
        })
    }

    async fn fetch_messages(&self, channel_id: &str, limit: u8) -> anyhow::Result<Vec<Message>> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_guild_members(&self, _guild_id: &str) -> anyhow::Result<Vec<GuildMember>> {
        Ok(self.members.lock().unwrap().clone())
    }

    async fn fetch_active_threads(&self, _guild_id: &str) -> anyhow::Result<Vec<Channel>> {
        Ok(self.active_threads.lock().unwrap().clone())
    }
}

pub fn test_context(api: Arc<RecordingApi>) -> Context {
    Context {
        api,
        bot_user_id: BOT_USER_ID.to_string(),
        guild_id: "1".to_string(),
    }
}
