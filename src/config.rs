//! Process configuration, pulled from the environment at startup.
//!
//! Only the bootstrap reads this; the Discord bot token itself is
//! loaded lazily by the client (see `discord::DiscordClient`).

use anyhow::Context as _;
use std::env;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Config {
    /// User id of the bot's own account.
    pub bot_user_id: String,
    /// Guild the bot operates on.
    pub guild_id: String,
    /// Path of the schedule registry file. A missing file means an
    /// empty schedule, not a startup failure.
    pub registry_path: PathBuf,
    /// Port the health endpoint listens on.
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            bot_user_id: env::var("DISCORD_BOT_USER_ID")
                .context("DISCORD_BOT_USER_ID is missing")?,
            guild_id: env::var("DISCORD_GUILD_ID").context("DISCORD_GUILD_ID is missing")?,
            registry_path: env::var("SCHEDULE_REGISTRY")
                .unwrap_or_else(|_| "schedules.toml".to_string())
                .into(),
            port: env::var("PORT")
                .ok()
                .map(|p| p.parse())
                .transpose()
                .context("PORT is not a valid port number")?
                .unwrap_or(8000),
        })
    }
}
