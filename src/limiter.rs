//! Sliding-window rate limiting for submission endpoints.
//!
//! The limiter sits behind a trait so the in-process implementation can be
//! swapped for a shared external counter without touching call sites. The
//! in-memory variant is best-effort and process-local: a multi-instance
//! deployment gets per-instance limits unless a shared-store implementation
//! is supplied.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Denied; retry after this many seconds (rounded up).
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count a request against `key`. First request for a key, or any
    /// request after the window has elapsed, resets the count to 1.
    async fn check(&self, key: &str, max_requests: u32, window: Duration) -> RateDecision;

    /// Forget a key entirely.
    async fn reset(&self, key: &str);
}

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
    window: Duration,
}

/// In-process sliding-window counter keyed by client identity.
#[derive(Debug, Clone, Default)]
pub struct MemoryRateLimiter {
    entries: Arc<RwLock<HashMap<String, WindowEntry>>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict entries whose window has long elapsed, to bound memory.
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| now.duration_since(e.window_start) < e.window * 2);
    }

    /// Periodic eviction loop; run as a background task.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tick.tick().await;
                self.sweep().await;
            }
        });
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimiter {
    async fn check(&self, key: &str, max_requests: u32, window: Duration) -> RateDecision {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) => {
                let elapsed = now.duration_since(entry.window_start);
                if elapsed >= entry.window {
                    entry.count = 1;
                    entry.window_start = now;
                    entry.window = window;
                    RateDecision::Allowed
                } else if entry.count >= max_requests {
                    let remaining = entry.window.saturating_sub(elapsed);
                    RateDecision::Limited {
                        retry_after_secs: remaining.as_secs_f64().ceil() as u64,
                    }
                } else {
                    entry.count += 1;
                    RateDecision::Allowed
                }
            }
            None => {
                entries.insert(
                    key.to_string(),
                    WindowEntry {
                        count: 1,
                        window_start: now,
                        window,
                    },
                );
                RateDecision::Allowed
            }
        }
    }

    async fn reset(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = MemoryRateLimiter::new();

        for _ in 0..5 {
            assert!(limiter.check("k", 5, WINDOW).await.is_allowed());
        }
        assert!(!limiter.check("k", 5, WINDOW).await.is_allowed());
    }

    #[tokio::test]
    async fn test_denial_reports_retry_after() {
        let limiter = MemoryRateLimiter::new();

        assert!(limiter.check("k", 1, WINDOW).await.is_allowed());
        match limiter.check("k", 1, WINDOW).await {
            RateDecision::Limited { retry_after_secs } => {
                // Nearly the whole window remains
                assert!(retry_after_secs >= 9 && retry_after_secs <= 10);
            }
            RateDecision::Allowed => panic!("second request within window should be denied"),
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = MemoryRateLimiter::new();

        assert!(limiter.check("a", 1, WINDOW).await.is_allowed());
        assert!(!limiter.check("a", 1, WINDOW).await.is_allowed());
        assert!(limiter.check("b", 1, WINDOW).await.is_allowed());
    }

    #[tokio::test]
    async fn test_window_reset() {
        let limiter = MemoryRateLimiter::new();
        let short = Duration::from_millis(50);

        assert!(limiter.check("k", 1, short).await.is_allowed());
        assert!(!limiter.check("k", 1, short).await.is_allowed());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(limiter.check("k", 1, short).await.is_allowed());
    }

    #[tokio::test]
    async fn test_reset_clears_key() {
        let limiter = MemoryRateLimiter::new();

        assert!(limiter.check("k", 1, WINDOW).await.is_allowed());
        assert!(!limiter.check("k", 1, WINDOW).await.is_allowed());

        limiter.reset("k").await;
        assert!(limiter.check("k", 1, WINDOW).await.is_allowed());
    }

    #[tokio::test]
    async fn test_sweep_evicts_stale_entries() {
        let limiter = MemoryRateLimiter::new();
        let short = Duration::from_millis(10);

        limiter.check("stale", 1, short).await;
        limiter.check("fresh", 1, WINDOW).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        limiter.sweep().await;

        let entries = limiter.entries.read().await;
        assert!(!entries.contains_key("stale"));
        assert!(entries.contains_key("fresh"));
    }
}
