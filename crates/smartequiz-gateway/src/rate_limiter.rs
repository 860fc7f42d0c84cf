//! Per-key fixed-window rate limiting.
//!
//! One window per API key in a concurrent map, so admission for one key
//! never contends with another key's counter. The window duration is
//! configurable (60 seconds in production); counts roll over atomically when
//! the window expires.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Default accounting window.
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// Outcome of an admission check, carrying everything the response headers
/// need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Seconds until the window resets, floored at 1 for `Retry-After`.
    pub fn retry_after_secs(&self) -> i64 {
        (self.reset_at - Utc::now()).num_seconds().max(1)
    }
}

#[derive(Debug)]
struct Window {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Fixed-window counters keyed by API key id.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    windows: DashMap<Uuid, Window>,
    window: Duration,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::with_window(Duration::seconds(DEFAULT_WINDOW_SECS))
    }

    /// Registry with a custom window duration (short windows in tests).
    pub fn with_window(window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            window,
        }
    }

    /// Admit or reject one request for the given key.
    ///
    /// The entry guard holds the key's shard exclusively for the whole
    /// read-modify-write, so two concurrent requests can never both take the
    /// last slot.
    pub fn check(&self, key_id: Uuid, limit: u32) -> RateLimitDecision {
        let now = Utc::now();
        let mut entry = self.windows.entry(key_id).or_insert_with(|| Window {
            window_start: now,
            count: 0,
        });

        if now - entry.window_start >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        entry.count += 1;
        let allowed = entry.count <= limit;
        let remaining = limit.saturating_sub(entry.count);
        let reset_at = entry.window_start + self.window;

        RateLimitDecision {
            allowed,
            limit,
            remaining,
            reset_at,
        }
    }

    /// Drop a key's window (on revocation; revoked keys stop being checked).
    pub fn forget(&self, key_id: Uuid) {
        self.windows.remove(&key_id);
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_allows_up_to_limit() {
        let registry = RateLimiterRegistry::new();
        let key = Uuid::new_v4();

        for i in 0..5 {
            let decision = registry.check(key, 5);
            assert!(decision.allowed, "request {} should be admitted", i + 1);
        }
        assert!(!registry.check(key, 5).allowed);
    }

    #[test]
    fn test_remaining_counts_down() {
        let registry = RateLimiterRegistry::new();
        let key = Uuid::new_v4();

        assert_eq!(registry.check(key, 3).remaining, 2);
        assert_eq!(registry.check(key, 3).remaining, 1);
        assert_eq!(registry.check(key, 3).remaining, 0);
        assert_eq!(registry.check(key, 3).remaining, 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = RateLimiterRegistry::new();
        let key_a = Uuid::new_v4();
        let key_b = Uuid::new_v4();

        for _ in 0..3 {
            registry.check(key_a, 3);
        }
        assert!(!registry.check(key_a, 3).allowed);
        assert!(registry.check(key_b, 3).allowed);
    }

    #[test]
    fn test_window_rolls_over() {
        let registry = RateLimiterRegistry::with_window(Duration::milliseconds(30));
        let key = Uuid::new_v4();

        assert!(registry.check(key, 1).allowed);
        assert!(!registry.check(key, 1).allowed);

        std::thread::sleep(std::time::Duration::from_millis(40));
        let decision = registry.check(key, 1);
        assert!(decision.allowed, "count must reset on window rollover");
    }

    #[test]
    fn test_reset_at_is_window_end() {
        let registry = RateLimiterRegistry::new();
        let key = Uuid::new_v4();
        let before = Utc::now();
        let decision = registry.check(key, 10);
        let expected = before + Duration::seconds(DEFAULT_WINDOW_SECS);
        let drift = (decision.reset_at - expected).num_milliseconds().abs();
        assert!(drift < 1_000, "reset_at should be ~window end, drift {drift}ms");
    }

    #[test]
    fn test_exactly_one_rejection_under_concurrency() {
        let registry = Arc::new(RateLimiterRegistry::new());
        let key = Uuid::new_v4();
        let limit = 50u32;
        let rejections = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..(limit + 1))
            .map(|_| {
                let registry = Arc::clone(&registry);
                let rejections = Arc::clone(&rejections);
                std::thread::spawn(move || {
                    if !registry.check(key, limit).allowed {
                        rejections.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            rejections.load(Ordering::SeqCst),
            1,
            "N+1 concurrent requests must yield exactly one rejection"
        );
    }

    #[test]
    fn test_forget_clears_window() {
        let registry = RateLimiterRegistry::new();
        let key = Uuid::new_v4();

        registry.check(key, 1);
        assert!(!registry.check(key, 1).allowed);
        registry.forget(key);
        assert!(registry.check(key, 1).allowed);
    }
}
