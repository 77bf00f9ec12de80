//! Fixed-window request throttling.
//!
//! `throttle:5,1` allows five requests per identity per one-minute window.
//! The window opens on the first hit and resets once it expires. The
//! identity is the authenticated subject when `auth` ran earlier in the
//! chain, otherwise the client IP.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{BoxFuture, Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// State of one key's window after a hit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Attempt {
    /// Hits in the current window, this one included.
    pub count: u32,
    /// Time until the window resets.
    pub resets_in: Duration,
}

/// Shared attempt counters.
///
/// `hit` must increment and read atomically: two concurrent requests for
/// the same key never observe the same count.
pub trait CounterStore: Send + Sync + 'static {
    fn hit(&self, key: &str, window: Duration) -> Attempt;
}

struct Window {
    count: u32,
    expires_at: Instant,
}

/// Longest window `throttle` accepts: one year, in minutes.
pub const MAX_WINDOW_MINUTES: u64 = 365 * 24 * 60;

const MAX_WINDOW: Duration = Duration::from_secs(MAX_WINDOW_MINUTES * 60);

const SWEEP_EVERY: u64 = 1024;

/// Process-local [`CounterStore`]. The `dashmap` entry lock makes each
/// increment-and-read atomic per key.
///
/// Expired windows are swept out every 1024 hits, so keys for clients that
/// stopped calling do not accumulate.
pub struct InMemoryCounterStore {
    windows: DashMap<String, Window>,
    hits: AtomicU64,
    sweep_every: u64,
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::with_sweep_interval(SWEEP_EVERY)
    }
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweeps expired windows once every `hits` calls to [`hit`](CounterStore::hit).
    pub fn with_sweep_interval(hits: u64) -> Self {
        Self {
            windows: DashMap::new(),
            hits: AtomicU64::new(0),
            sweep_every: hits.max(1),
        }
    }

    /// Drops windows that have already expired. Returns how many remain.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.windows.retain(|_, w| w.expires_at > now);
        self.windows.len()
    }

    /// Number of tracked keys, expired or not.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn hit(&self, key: &str, window: Duration) -> Attempt {
        // Sweep before taking the entry lock; `retain` locks every shard.
        if self.hits.fetch_add(1, Ordering::Relaxed) % self.sweep_every == self.sweep_every - 1 {
            let remaining = self.purge_expired();
            debug!(remaining, "swept expired throttle windows");
        }

        let now = Instant::now();
        let expires_at = now + window.min(MAX_WINDOW);
        let mut entry = self.windows
            .entry(key.to_owned())
            .or_insert_with(|| Window { count: 0, expires_at });
        if entry.expires_at <= now {
            *entry = Window { count: 0, expires_at };
        }
        entry.count = entry.count.saturating_add(1);
        Attempt {
            count: entry.count,
            resets_in: entry.expires_at.saturating_duration_since(now),
        }
    }
}

/// The `throttle` middleware.
pub struct Throttle {
    store: Arc<dyn CounterStore>,
    max_attempts: u32,
    window: Duration,
}

impl Throttle {
    /// Windows longer than [`MAX_WINDOW_MINUTES`] are clamped to it.
    pub fn new(store: Arc<dyn CounterStore>, max_attempts: u32, window_minutes: u64) -> Self {
        Self {
            store,
            max_attempts,
            window: Duration::from_secs(window_minutes.min(MAX_WINDOW_MINUTES) * 60),
        }
    }

    fn key(&self, req: &Request) -> String {
        let identity = req.principal()
            .map(|p| p.subject.clone())
            .or_else(|| req.remote_addr().map(|a| a.ip().to_string()))
            .unwrap_or_else(|| "anonymous".to_owned());
        format!("{identity}|{}|{}", self.max_attempts, self.window.as_secs())
    }
}

impl Middleware for Throttle {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let key = self.key(&req);
            let attempt = self.store.hit(&key, self.window);

            if attempt.count > self.max_attempts {
                let retry_after = attempt.resets_in.as_secs()
                    + u64::from(attempt.resets_in.subsec_nanos() > 0);
                warn!(key = %key, count = attempt.count, retry_after, "rate limit exceeded");
                let mut res = Response::error(Status::TooManyRequests, "Too Many Attempts.");
                res.set_header("retry-after", retry_after.to_string());
                res.set_header("x-ratelimit-limit", self.max_attempts.to_string());
                res.set_header("x-ratelimit-remaining", "0");
                return res;
            }

            let mut res = next.run(req).await;
            res.set_header("x-ratelimit-limit", self.max_attempts.to_string());
            res.set_header("x-ratelimit-remaining", (self.max_attempts - attempt.count).to_string());
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn counts_within_window_and_resets_after() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.hit("k", MINUTE).count, 1);
        assert_eq!(store.hit("k", MINUTE).count, 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        let attempt = store.hit("k", MINUTE);
        assert_eq!(attempt.count, 3);
        assert_eq!(attempt.resets_in, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.hit("k", MINUTE).count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let store = InMemoryCounterStore::new();
        store.hit("a", MINUTE);
        store.hit("a", MINUTE);
        assert_eq!(store.hit("b", MINUTE).count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_windows() {
        let store = InMemoryCounterStore::new();
        store.hit("short", Duration::from_secs(10));
        store.hit("long", MINUTE);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.purge_expired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_windows_are_swept_during_hits() {
        let store = InMemoryCounterStore::with_sweep_interval(4);
        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            store.hit(ip, Duration::from_secs(1));
        }
        assert_eq!(store.len(), 3);

        tokio::time::advance(Duration::from_secs(2)).await;
        store.hit("10.0.0.4", MINUTE);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_windows_are_clamped() {
        let store = Arc::new(InMemoryCounterStore::new());
        let throttle = Throttle::new(store.clone(), 5, u64::MAX);
        assert_eq!(throttle.window, MAX_WINDOW);
        assert_eq!(store.hit("k", throttle.window).resets_in, MAX_WINDOW);
        assert_eq!(store.hit("huge", Duration::MAX).resets_in, MAX_WINDOW);
    }

    #[tokio::test]
    async fn concurrent_hits_never_share_a_count() {
        let store = Arc::new(InMemoryCounterStore::new());
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..64 {
            let store = Arc::clone(&store);
            tasks.spawn(async move { store.hit("shared", MINUTE).count });
        }
        let mut seen = Vec::new();
        while let Some(count) = tasks.join_next().await {
            seen.push(count.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=64).collect::<Vec<u32>>());
    }
}
