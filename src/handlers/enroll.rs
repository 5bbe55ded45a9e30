//! Silent membership enrollment.
//!
//! Sending a message that mentions a user pulls them into the thread
//! it was sent in, but a single message only delivers silent
//! mentions reliably for about ten users. So enrollment works
//! through one reusable "marker" post per thread: the post's content
//! is rewritten to one batch of mentions at a time, each edit with
//! suppressed notifications and an allow-list restricted to that
//! batch, and cleared back to an invisible placeholder at the end.
//! Re-running an enrollment converges on the same post instead of
//! littering the thread.

use crate::discord::api::{AllowedMentions, Message, PLACEHOLDER};
use crate::handlers::Context;
use anyhow::Context as _;

/// A single message reliably delivers silent mentions for at most
/// this many users.
const MENTION_BATCH_SIZE: usize = 10;

/// Page bound when scanning a thread for an existing marker post. A
/// marker buried deeper than this is missed and a duplicate gets
/// created; subsequent runs then converge on whichever one the scan
/// finds first.
const MARKER_SCAN_LIMIT: u8 = 50;

/// A thread was created: silently add every current human member of
/// the guild to it.
pub(super) async fn thread_created(ctx: &Context, thread_id: &str) -> anyhow::Result<()> {
    let members = ctx
        .api
        .fetch_guild_members(&ctx.guild_id)
        .await
        .context("fetching guild members")?;
    let user_ids: Vec<String> = members
        .into_iter()
        .filter(|m| !m.user.bot && m.user.id != ctx.bot_user_id)
        .map(|m| m.user.id)
        .collect();
    enroll(ctx, thread_id, &user_ids, None).await?;
    Ok(())
}

/// A member joined the guild: silently add them to every active
/// thread. One thread failing does not stop the others.
pub(super) async fn member_joined(ctx: &Context, user_id: &str) -> anyhow::Result<()> {
    let threads = ctx
        .api
        .fetch_active_threads(&ctx.guild_id)
        .await
        .context("fetching active threads")?;
    let user_ids = vec![user_id.to_string()];
    for thread in threads {
        if let Err(e) = enroll(ctx, &thread.id, &user_ids, None).await {
            tracing::error!("failed to add {user_id} to thread {}: {e:?}", thread.id);
        }
    }
    Ok(())
}

/// Enrolls `user_ids` into a thread in mention batches against a
/// single marker post, creating the post only when neither the
/// caller nor the thread history provides one. Returns the marker so
/// callers handling a later event on the same thread can pass it
/// back in.
pub(super) async fn enroll(
    ctx: &Context,
    thread_id: &str,
    user_ids: &[String],
    marker: Option<Message>,
) -> anyhow::Result<Option<Message>> {
    if user_ids.is_empty() {
        return Ok(marker);
    }

    // The bot has to be a thread member before it can post there.
    // Joining when already a member fails; that is the common case
    // and not worth surfacing.
    if let Err(e) = ctx.api.join_thread(thread_id).await {
        tracing::debug!("joining thread {thread_id}: {e}");
    }

    let marker = match marker {
        Some(marker) => Some(marker),
        None => match find_marker(ctx, thread_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("failed to scan thread {thread_id} for a marker post: {e:?}");
                None
            }
        },
    };
    let post = match marker {
        Some(marker) => marker,
        None => ctx
            .api
            .create_post(thread_id, PLACEHOLDER, AllowedMentions::none())
            .await
            .context("creating marker post")?,
    };

    for batch in user_ids.chunks(MENTION_BATCH_SIZE) {
        let mentions = batch
            .iter()
            .map(|id| format!("<@{id}>"))
            .collect::<Vec<_>>()
            .join(" ");
        // Each edit overwrites the previous batch; membership
        // registers on edit, so nothing needs reverting in between.
        if let Err(e) = ctx
            .api
            .edit_post(
                &post.channel_id,
                &post.id,
                &mentions,
                AllowedMentions::for_users(batch),
            )
            .await
        {
            tracing::error!(
                "failed to enroll a batch of {} users into thread {thread_id}: {e:?}",
                batch.len()
            );
        }
    }

    // Leave the marker blank rather than showing the last batch's
    // mention list forever. The post itself stays for reuse.
    if let Err(e) = ctx
        .api
        .edit_post(
            &post.channel_id,
            &post.id,
            PLACEHOLDER,
            AllowedMentions::none(),
        )
        .await
    {
        tracing::warn!("failed to clear marker post in thread {thread_id}: {e:?}");
    }

    Ok(Some(post))
}

/// Locates a previously created marker post: the oldest message in
/// the thread authored by the bot itself, within the first
/// [`MARKER_SCAN_LIMIT`] messages.
async fn find_marker(ctx: &Context, thread_id: &str) -> anyhow::Result<Option<Message>> {
    let messages = ctx
        .api
        .fetch_messages(thread_id, MARKER_SCAN_LIMIT)
        .await
        .context("fetching thread history")?;
    Ok(messages
        .into_iter()
        .find(|m| m.author.id == ctx.bot_user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{test_context, RecordingApi, BOT_USER_ID};

    fn ids(range: std::ops::Range<u32>) -> Vec<String> {
        range.map(|i| i.to_string()).collect()
    }

    #[tokio::test]
    async fn twenty_three_users_make_three_batches_on_one_post() {
        let api = RecordingApi::new();
        let ctx = test_context(api.clone());

        let marker = enroll(&ctx, "500", &ids(0..23), None).await.unwrap();
        let marker = marker.expect("a marker post was created");

        // Exactly one post exists in the thread.
        assert_eq!(api.posts.lock().unwrap().len(), 1);

        let edits = api.edits.lock().unwrap();
        // Placeholder create, three batches and the final clear,
        // all against the same message.
        assert_eq!(edits.len(), 5);
        assert!(edits.iter().all(|e| e.message_id == marker.id));
        assert_eq!(edits[0].content, PLACEHOLDER);
        assert_eq!(edits[1].allowed_users.len(), 10);
        assert_eq!(edits[2].allowed_users.len(), 10);
        assert_eq!(edits[3].allowed_users, vec!["20", "21", "22"]);
        assert_eq!(edits[3].content, "<@20> <@21> <@22>");
        assert_eq!(edits[4].content, PLACEHOLDER);
        assert!(edits[4].allowed_users.is_empty());
    }

    #[tokio::test]
    async fn second_event_reuses_the_marker_via_the_locator() {
        let api = RecordingApi::new();
        let ctx = test_context(api.clone());

        let first = enroll(&ctx, "500", &ids(0..3), None).await.unwrap().unwrap();
        let second = enroll(&ctx, "500", &["99".to_string()], None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(api.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn locator_ignores_posts_by_other_authors() {
        let api = RecordingApi::new();
        let ctx = test_context(api.clone());
        api.seed_post("500", "7"); // someone else's message, older
        let ours = api.seed_post("500", BOT_USER_ID);

        let marker = enroll(&ctx, "500", &ids(0..3), None).await.unwrap().unwrap();
        assert_eq!(marker.id, ours.id);
        // Nothing new was created.
        assert_eq!(api.posts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn supplied_marker_skips_the_scan() {
        let api = RecordingApi::new();
        let ctx = test_context(api.clone());
        let existing = api.seed_post("500", BOT_USER_ID);

        let marker = enroll(&ctx, "500", &ids(0..1), Some(existing.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(marker.id, existing.id);
    }

    #[tokio::test]
    async fn join_failure_is_swallowed() {
        let api = RecordingApi::new();
        *api.fail_joins.lock().unwrap() = true;
        let ctx = test_context(api.clone());

        let marker = enroll(&ctx, "500", &ids(0..2), None).await.unwrap();
        assert!(marker.is_some());
        assert_eq!(api.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn edit_failures_do_not_abort_the_run() {
        let api = RecordingApi::new();
        let ctx = test_context(api.clone());
        let existing = api.seed_post("500", BOT_USER_ID);
        api.failing_channels.lock().unwrap().push("500".to_string());

        // Every batch edit fails under rate limiting; the run still
        // completes and hands the marker back for the next attempt.
        let marker = enroll(&ctx, "500", &ids(0..23), None).await.unwrap();
        assert_eq!(marker.unwrap().id, existing.id);
        assert!(api.edits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_users_means_no_posts() {
        let api = RecordingApi::new();
        let ctx = test_context(api.clone());

        let marker = enroll(&ctx, "500", &[], None).await.unwrap();
        assert!(marker.is_none());
        assert!(api.joins.lock().unwrap().is_empty());
        assert!(api.posts.lock().unwrap().is_empty());
    }
}
