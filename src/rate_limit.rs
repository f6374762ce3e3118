use dashmap::DashMap;
use std::time::Duration;

use crate::metrics::RATE_LIMIT_BUCKETS;

// Rate limit bucket - one per client key, only valid for one fixed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub count: u64,
    pub window_start_ms: u64,
}

/// Storage for rate limit buckets.
///
/// The default is a process-local map; anything shared across instances
/// (a cache server, a KV store) can sit behind the same three calls.
pub trait RateLimitStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Bucket>;

    /// Count one request for `key` in the window starting at `window_start_ms`.
    /// A bucket left over from another window starts again from zero.
    fn increment(&self, key: &str, window_start_ms: u64) -> Bucket;

    /// Drop every bucket whose window started before `cutoff_ms`.
    /// Returns how many were removed.
    fn sweep(&self, cutoff_ms: u64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    buckets: DashMap<String, Bucket>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<Bucket> {
        self.buckets.get(key).map(|b| *b)
    }

    fn increment(&self, key: &str, window_start_ms: u64) -> Bucket {
        let mut entry = self
            .buckets
            .entry(key.to_string())
            .or_insert(Bucket {
                count: 0,
                window_start_ms,
            });

        // new window..? start over
        if entry.window_start_ms != window_start_ms {
            entry.count = 0;
            entry.window_start_ms = window_start_ms;
        }
        entry.count += 1;
        *entry
    }

    fn sweep(&self, cutoff_ms: u64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, b| b.window_start_ms >= cutoff_ms);
        before.saturating_sub(self.buckets.len())
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }
}

// Outcome of a single check, carries everything the response headers need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_secs: u64,
    pub retry_after_secs: u64,
}

pub fn window_start(now_ms: u64, window_ms: u64) -> u64 {
    (now_ms / window_ms) * window_ms
}

/// Fixed-window limiter keyed by client IP.
pub struct RateLimiter<S = InMemoryStore> {
    store: S,
    limit: u64,
    window_ms: u64,
    sweep_probability: f64,
}

impl RateLimiter<InMemoryStore> {
    pub fn in_memory(limit: u64, window: Duration) -> Self {
        Self::new(InMemoryStore::new(), limit, window)
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: S, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            // a zero window would divide by zero in window_start
            window_ms: (window.as_millis() as u64).max(1),
            sweep_probability: 0.01,
        }
    }

    pub fn with_sweep_probability(mut self, probability: f64) -> Self {
        self.sweep_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn check(&self, ip: &str) -> Decision {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.check_at(ip, now_ms)
    }

    pub fn check_at(&self, ip: &str, now_ms: u64) -> Decision {
        let key = format!("ratelimit:{}", ip);
        let window_start = window_start(now_ms, self.window_ms);

        // counted before the limit is evaluated, so the request that
        // crosses the threshold is the one rejected
        let bucket = self.store.increment(&key, window_start);

        if self.sweep_probability > 0.0 && rand::random_bool(self.sweep_probability) {
            self.sweep_at(now_ms);
        }

        Decision {
            allowed: bucket.count <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(bucket.count),
            reset_secs: (window_start + self.window_ms) / 1000,
            retry_after_secs: self.window_ms / 1000,
        }
    }

    // keeps two windows worth of buckets
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(self.window_ms * 2);
        let removed = self.store.sweep(cutoff);
        RATE_LIMIT_BUCKETS.set(self.store.len() as f64);
        if removed > 0 {
            tracing::debug!(removed, remaining = self.store.len(), "swept stale rate limit buckets");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);
    // 2024-01-01T00:00:00Z, aligned to a minute
    const T0: u64 = 1_704_067_200_000;

    fn limiter() -> RateLimiter {
        RateLimiter::in_memory(60, WINDOW).with_sweep_probability(0.0)
    }

    #[test]
    fn window_start_floors_to_boundary() {
        assert_eq!(window_start(T0, 60_000), T0);
        assert_eq!(window_start(T0 + 59_999, 60_000), T0);
        assert_eq!(window_start(T0 + 60_000, 60_000), T0 + 60_000);
    }

    #[test]
    fn sixty_requests_pass_and_sixty_first_is_rejected() {
        let limiter = limiter();
        for i in 1..=60 {
            let d = limiter.check_at("10.0.0.1", T0 + i);
            assert!(d.allowed, "request {} should pass", i);
            assert_eq!(d.remaining, 60 - i);
        }

        let d = limiter.check_at("10.0.0.1", T0 + 500);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.retry_after_secs, 60);
        assert_eq!(d.reset_secs, (T0 + 60_000) / 1000);
    }

    #[test]
    fn counter_resets_after_window_rollover() {
        let limiter = limiter();
        for _ in 0..61 {
            limiter.check_at("10.0.0.1", T0 + 10);
        }
        assert!(!limiter.check_at("10.0.0.1", T0 + 59_999).allowed);

        let d = limiter.check_at("10.0.0.1", T0 + 60_000);
        assert!(d.allowed);
        assert_eq!(d.remaining, 59);
        assert_eq!(d.reset_secs, (T0 + 120_000) / 1000);
    }

    #[test]
    fn ips_have_separate_buckets() {
        let limiter = limiter();
        for _ in 0..61 {
            limiter.check_at("10.0.0.1", T0);
        }
        assert!(!limiter.check_at("10.0.0.1", T0).allowed);
        assert!(limiter.check_at("10.0.0.2", T0).allowed);
        assert_eq!(limiter.store().len(), 2);
    }

    #[test]
    fn store_keys_are_prefixed() {
        let limiter = limiter();
        limiter.check_at("unknown", T0);
        let bucket = limiter.store().get("ratelimit:unknown").unwrap();
        assert_eq!(bucket.count, 1);
        assert_eq!(bucket.window_start_ms, T0);
    }

    #[test]
    fn sweep_drops_buckets_older_than_two_windows() {
        let limiter = limiter();
        limiter.check_at("old", T0);
        limiter.check_at("recent", T0 + 120_000);
        limiter.check_at("current", T0 + 180_000);

        // cutoff = T0 + 180_500 - 120_000 = T0 + 60_500
        let removed = limiter.sweep_at(T0 + 180_500);
        assert_eq!(removed, 1);
        assert!(limiter.store().get("ratelimit:old").is_none());
        assert!(limiter.store().get("ratelimit:recent").is_some());
        assert!(limiter.store().get("ratelimit:current").is_some());
    }

    #[test]
    fn certain_sweep_runs_on_every_check() {
        let limiter = RateLimiter::in_memory(60, WINDOW).with_sweep_probability(1.0);
        limiter.check_at("old", T0);
        limiter.check_at("new", T0 + 600_000);
        assert_eq!(limiter.store().len(), 1);
    }

    #[test]
    fn sweep_probability_is_clamped() {
        let limiter = RateLimiter::in_memory(60, WINDOW).with_sweep_probability(7.5);
        assert_eq!(limiter.sweep_probability, 1.0);
        let limiter = RateLimiter::in_memory(60, WINDOW).with_sweep_probability(-1.0);
        assert_eq!(limiter.sweep_probability, 0.0);
    }
}
