//! Fixed-window API rate limiting
//!
//! Per-client counters in process memory; a window that has aged out resets
//! on the next hit. Coarse by design — the limiter protects the process,
//! not billing.

use std::time::{Duration, Instant};

use dashmap::DashMap;

pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    hits: DashMap<String, (Instant, u32)>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self { window, max_requests, hits: DashMap::new() }
    }

    /// Record a hit for `key`; false means the caller is over its budget.
    pub fn check(&self, key: &str) -> bool {
        if self.max_requests == 0 {
            return true;
        }
        let now = Instant::now();
        let mut entry = self.hits.entry(key.to_string()).or_insert((now, 0));
        let (window_start, count) = *entry;

        if now.duration_since(window_start) > self.window {
            *entry = (now, 1);
            return true;
        }
        if count >= self.max_requests {
            return false;
        }
        *entry = (window_start, count + 1);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_window_budget() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        // Other clients have their own budget
        assert!(limiter.check("b"));
    }

    #[test]
    fn expired_window_resets() {
        let limiter = RateLimiter::new(Duration::from_millis(10), 1);
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("a"));
    }

    #[test]
    fn zero_budget_disables_limiting() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 0);
        for _ in 0..100 {
            assert!(limiter.check("a"));
        }
    }
}
