//! Consecutive-day visit streak.
//!
//! Two values are persisted through a [`StreakStorage`]: the current count and
//! the timestamp of the last calculation. Days are compared on the calendar of
//! the time zone the caller passes in, so "yesterday" means the previous local
//! date rather than the previous 24 hours.

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::storage::StreakStorage;

pub const STREAK_COUNT_KEY: &str = "openbook_streak_count";
pub const STREAK_LAST_VISIT_KEY: &str = "openbook_streak_lastVisit";
pub const STREAK_LAST_CELEBRATED_MILESTONE_KEY: &str = "openbook_streak_lastCelebratedMilestone";

pub const MILESTONES: [u32; 3] = [7, 30, 100];

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

pub struct StreakTracker<S> {
    storage: S,
}

impl<S: StreakStorage> StreakTracker<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn calculate(&self) -> u32 {
        self.calculate_at(&Local::now())
    }

    /// Recompute the streak as of `now` and persist the result.
    ///
    /// Missing or corrupt state counts as a first visit and yields 1. The
    /// stored visit time is refreshed on every call, so repeated calls on the
    /// same day keep the count and only move the timestamp forward.
    pub fn calculate_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> u32 {
        let today = now.date_naive();

        let count = match (self.stored_count(), self.stored_last_visit(&now.timezone())) {
            (Some(count), Some(last_visit)) => next_count(count, (today - last_visit).num_days()),
            _ => 1,
        };

        let count_value = count.to_string();
        let visited = iso_timestamp(now);
        self.storage.set_many(&[
            (STREAK_COUNT_KEY, count_value.as_str()),
            (STREAK_LAST_VISIT_KEY, visited.as_str()),
        ]);
        count
    }

    // Stored count without touching storage
    pub fn current(&self) -> Option<u32> {
        self.stored_last_visit(&Utc)?;
        self.stored_count()
    }

    pub fn reset(&self) {
        self.storage.remove(STREAK_COUNT_KEY);
        self.storage.remove(STREAK_LAST_VISIT_KEY);
    }

    /// Returns the milestone reached by `streak` if it has not been celebrated
    /// yet, remembering it so the same milestone is reported only once in a row.
    pub fn celebrate(&self, streak: u32) -> Option<u32> {
        let milestone = MILESTONES.into_iter().find(|m| *m == streak)?;
        let last = self
            .storage
            .get(STREAK_LAST_CELEBRATED_MILESTONE_KEY)
            .and_then(|v| v.trim().parse::<u32>().ok());

        if last == Some(milestone) {
            return None;
        }
        self.storage
            .set(STREAK_LAST_CELEBRATED_MILESTONE_KEY, &milestone.to_string());
        Some(milestone)
    }

    fn stored_count(&self) -> Option<u32> {
        self.storage
            .get(STREAK_COUNT_KEY)?
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|c| *c > 0)
    }

    fn stored_last_visit<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDate> {
        let raw = self.storage.get(STREAK_LAST_VISIT_KEY)?;
        let parsed = DateTime::parse_from_rfc3339(raw.trim()).ok()?;
        Some(parsed.with_timezone(tz).date_naive())
    }
}

// 0 keeps, 1 extends, anything else (gaps and clocks moved backwards) resets
fn next_count(count: u32, diff_days: i64) -> u32 {
    match diff_days {
        0 => count,
        1 => count.saturating_add(1),
        _ => 1,
    }
}

fn iso_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Background re-evaluation of a streak, so a session left open across
/// midnight picks up the new day. The task stops when the watcher is dropped.
pub struct StreakWatcher {
    rx: watch::Receiver<u32>,
    task: JoinHandle<()>,
}

impl StreakWatcher {
    pub fn spawn<S>(tracker: Arc<StreakTracker<S>>, period: Duration) -> Self
    where
        S: StreakStorage + 'static,
    {
        Self::spawn_with_clock(tracker, period, Local::now)
    }

    /// Like [`StreakWatcher::spawn`], reading "now" from `clock` on every tick.
    pub fn spawn_with_clock<S, Tz, C>(tracker: Arc<StreakTracker<S>>, period: Duration, clock: C) -> Self
    where
        S: StreakStorage + 'static,
        Tz: TimeZone + Send + 'static,
        Tz::Offset: Send,
        C: Fn() -> DateTime<Tz> + Send + 'static,
    {
        let (tx, rx) = watch::channel(tracker.calculate_at(&clock()));

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately, the initial value is already out
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let streak = tracker.calculate_at(&clock());
                tx.send_if_modified(|current| {
                    if *current == streak {
                        return false;
                    }
                    tracing::info!(from = *current, to = streak, "streak changed");
                    *current = streak;
                    true
                });
            }
        });

        Self { rx, task }
    }

    pub fn current(&self) -> u32 {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.rx.clone()
    }
}

impl Drop for StreakWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
