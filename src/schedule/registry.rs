//! The schedule registry: the declarative list of recurring messages,
//! loaded from a TOML file.
//!
//! Loading never fails the caller. A missing or malformed file
//! degrades to an empty schedule list, and an entry with an invalid
//! interval is skipped on its own, so one bad entry cannot take the
//! whole registry down with it.

use crate::interval::parse_interval;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;

/// One configured recurring-message rule. Immutable once loaded;
/// reloading the registry produces a fresh list.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleEntry {
    pub channel_id: String,
    pub start: DateTime<Utc>,
    pub interval: Duration,
    pub message: String,
}

#[derive(Debug, serde::Deserialize)]
struct RegistryFile {
    #[serde(default)]
    schedule: Vec<RawEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct RawEntry {
    channel_id: String,
    start: DateTime<Utc>,
    interval: String,
    message: String,
}

pub fn load(path: &Path) -> Vec<ScheduleEntry> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("no schedule registry at {}", path.display());
            return Vec::new();
        }
        Err(e) => {
            tracing::error!(
                "failed to read schedule registry {}: {}",
                path.display(),
                e
            );
            return Vec::new();
        }
    };
    parse(&contents)
}

fn parse(contents: &str) -> Vec<ScheduleEntry> {
    let file = match toml::from_str::<RegistryFile>(contents) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("malformed schedule registry: {}", e);
            return Vec::new();
        }
    };

    let mut entries = Vec::with_capacity(file.schedule.len());
    for raw in file.schedule {
        match parse_interval(&raw.interval) {
            Ok(interval) => entries.push(ScheduleEntry {
                channel_id: raw.channel_id,
                start: raw.start,
                interval,
                message: raw.message,
            }),
            Err(e) => {
                tracing::error!(
                    "skipping schedule entry for channel {}: {}",
                    raw.channel_id,
                    e
                );
            }
        }
    }
    entries
}
