//! Dispatch of platform events to their handlers.
//!
//! The gateway layer feeding events in is out of scope here; it
//! deserializes whatever transport it uses into an [`Event`] and
//! calls [`handle`]. Handler failures are logged and contained, they
//! never take the process down.

use crate::discord::ChatApi;
use std::sync::Arc;

mod enroll;

pub struct Context {
    pub api: Arc<dyn ChatApi>,
    /// User id of the bot's own account. Marker posts are recognized
    /// by this author id.
    pub bot_user_id: String,
    /// Guild whose membership and threads enrollment operates on.
    pub guild_id: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A thread was created; its existing audience gets enrolled.
    ThreadCreate { thread_id: String },
    /// A member joined the guild; they get enrolled into every
    /// active thread.
    MemberJoin { user_id: String },
}

pub async fn handle(ctx: &Context, event: &Event) {
    match event {
        Event::ThreadCreate { thread_id } => {
            if let Err(e) = enroll::thread_created(ctx, thread_id).await {
                tracing::error!("failed to enroll members into thread {thread_id}: {e:?}");
            }
        }
        Event::MemberJoin { user_id } => {
            if let Err(e) = enroll::member_joined(ctx, user_id).await {
                tracing::error!("failed to enroll new member {user_id}: {e:?}");
            }
        }
    }
}
