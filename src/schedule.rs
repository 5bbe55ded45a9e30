//! The recurring schedule engine.
//!
//! The engine does not wake exactly on occurrence boundaries; it
//! polls the loaded registry on a fixed cadence and lets the
//! [`due::is_due`] predicate decide, per entry, whether the current
//! tick falls inside the tolerance window of a boundary. Dispatch
//! state is held per loaded registry generation and thrown away on
//! reinitialization, so a reload starts from a clean slate.

pub mod due;
pub mod registry;

use crate::discord::ChatApi;
use crate::schedule::registry::ScheduleEntry;
use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// How often the registry is re-evaluated. This is also the
/// tolerance window handed to the due check, so a tick claims an
/// occurrence boundary it lands at most one cadence after.
pub const CHECK_CADENCE_IN_SECS: u64 = 60;

pub struct ScheduleEngine {
    api: Arc<dyn ChatApi>,
    registry_path: PathBuf,
    cadence: Duration,
    poll_loop: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduleEngine {
    pub fn new(api: Arc<dyn ChatApi>, registry_path: PathBuf) -> Self {
        Self::with_cadence(
            api,
            registry_path,
            Duration::seconds(CHECK_CADENCE_IN_SECS as i64),
        )
    }

    pub fn with_cadence(
        api: Arc<dyn ChatApi>,
        registry_path: PathBuf,
        cadence: Duration,
    ) -> Self {
        ScheduleEngine {
            api,
            registry_path,
            cadence,
            poll_loop: Mutex::new(None),
        }
    }

    /// Stops any running poll loop, reloads the registry and starts
    /// over with cleared last-sent state. An empty registry leaves
    /// the timer unarmed. Safe to call at any time to pick up
    /// registry changes.
    pub async fn initialize(&self) {
        self.stop();

        let entries = registry::load(&self.registry_path);
        if entries.is_empty() {
            tracing::info!("schedule registry is empty, leaving the schedule timer unarmed");
            return;
        }
        for entry in &entries {
            // The due-check window math needs at least two ticks per
            // interval to tell occurrences apart.
            if entry.interval < self.cadence * 2 {
                tracing::warn!(
                    "schedule for channel {} has an interval shorter than twice the \
                     check cadence; occurrence detection will be unreliable",
                    entry.channel_id
                );
            }
        }
        tracing::info!("starting schedule engine with {} entries", entries.len());

        let mut sweeper = Sweeper::new(self.api.clone(), entries, self.cadence);
        sweeper.sweep(Utc::now()).await;

        let period = self
            .cadence
            .to_std()
            .unwrap_or_else(|_| std::time::Duration::from_secs(CHECK_CADENCE_IN_SECS));
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick completes immediately and the
            // initial sweep already ran, so consume it.
            timer.tick().await;
            loop {
                timer.tick().await;
                sweeper.sweep(Utc::now()).await;
            }
        });
        *self.poll_loop.lock().unwrap() = Some(handle);
    }

    /// Cancels the poll loop. Idempotent; a stopped engine can be
    /// brought back with [`ScheduleEngine::initialize`].
    pub fn stop(&self) {
        if let Some(handle) = self.poll_loop.lock().unwrap().take() {
            handle.abort();
            tracing::info!("schedule engine stopped");
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.poll_loop.lock().unwrap().is_some()
    }
}

impl Drop for ScheduleEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One loaded registry generation plus its dispatch state. Replaced
/// wholesale whenever the engine is reinitialized.
struct Sweeper {
    api: Arc<dyn ChatApi>,
    entries: Vec<ScheduleEntry>,
    window: Duration,
    /// Entry index to last successful dispatch. An index is present
    /// only once its entry has been sent at least once, and its value
    /// never moves backwards.
    last_sent: HashMap<usize, DateTime<Utc>>,
}

impl Sweeper {
    fn new(api: Arc<dyn ChatApi>, entries: Vec<ScheduleEntry>, window: Duration) -> Self {
        Sweeper {
            api,
            entries,
            window,
            last_sent: HashMap::new(),
        }
    }

    /// Evaluates every entry against `now` and dispatches the due
    /// ones. A failing entry is logged and left untouched so it gets
    /// retried on the next tick; it never stops the sweep of the
    /// remaining entries.
    async fn sweep(&mut self, now: DateTime<Utc>) {
        for idx in 0..self.entries.len() {
            let entry = &self.entries[idx];
            if !due::is_due(
                entry.start,
                entry.interval,
                now,
                self.last_sent.get(&idx).copied(),
                self.window,
            ) {
                continue;
            }
            match self.dispatch(idx).await {
                Ok(()) => {
                    self.last_sent.insert(idx, now);
                }
                Err(e) => {
                    tracing::error!(
                        "failed to dispatch schedule for channel {}: {:?}",
                        self.entries[idx].channel_id,
                        e
                    );
                }
            }
        }
    }

    async fn dispatch(&self, idx: usize) -> anyhow::Result<()> {
        let entry = &self.entries[idx];
        let channel = self
            .api
            .fetch_channel(&entry.channel_id)
            .await
            .with_context(|| format!("fetching channel {}", entry.channel_id))?
            .ok_or_else(|| anyhow::anyhow!("channel {} does not resolve", entry.channel_id))?;
        if !channel.is_text_capable() {
            anyhow::bail!("channel {} cannot receive text messages", entry.channel_id);
        }
        self.api
            .send_message(&entry.channel_id, &entry.message)
            .await
            .with_context(|| format!("sending scheduled message to {}", entry.channel_id))?;
        tracing::debug!("dispatched scheduled message to channel {}", entry.channel_id);
        Ok(())
    }
}
