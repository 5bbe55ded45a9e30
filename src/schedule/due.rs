//! The due-check predicate: decides whether one schedule entry has
//! hit an occurrence boundary, given an imprecise polling clock.

use chrono::{DateTime, Duration, Utc};

/// Returns whether a schedule is due at `now`.
///
/// The schedule fires at `start`, `start + interval`,
/// `start + 2*interval`, and so on. Because the caller polls rather
/// than waking exactly on those boundaries, a tick counts as hitting
/// a boundary whenever it lands within `window` after it. `window`
/// must be the caller's polling period.
///
/// Pure and deterministic in its inputs so it can be tested without a
/// clock. A non-positive interval never fires.
pub fn is_due(
    start: DateTime<Utc>,
    interval: Duration,
    now: DateTime<Utc>,
    last_sent: Option<DateTime<Utc>>,
    window: Duration,
) -> bool {
    if now < start || interval <= Duration::zero() {
        return false;
    }

    let elapsed = now - start;
    let phase =
        Duration::milliseconds(elapsed.num_milliseconds() % interval.num_milliseconds());
    if phase >= window {
        return false;
    }

    // Half an interval distinguishes "already sent for this
    // occurrence" from "a full interval has passed, due again". The
    // fraction is coupled to the polling cadence: if the cadence ever
    // grows past half the smallest interval, this threshold must be
    // revisited or sends get dropped or doubled.
    if let Some(last) = last_sent {
        if now - last < interval / 2 {
            return false;
        }
    }

    true
}
