use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-caller sliding-window limiter.
///
/// A caller may be admitted at most `limit` times within any trailing
/// `window`. Excess requests are rejected immediately, never queued.
/// Owned by the router state; nothing here is global.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key` now; `true` if it is admitted.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(|p| p.into_inner());

        // Drop callers whose whole history has aged out.
        hits.retain(|_, stamps| {
            Self::evict(stamps, now, self.window);
            !stamps.is_empty()
        });

        let stamps = hits.entry(key.to_string()).or_default();
        if stamps.len() >= self.limit {
            return false;
        }
        stamps.push_back(now);
        true
    }

    fn evict(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = stamps.front() {
            if now.saturating_duration_since(*front) >= window {
                stamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn tracked_callers(&self) -> usize {
        self.hits.lock().map(|h| h.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_beyond_limit_within_window() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.check_at("ip", t0));
        assert!(limiter.check_at("ip", t0 + Duration::from_secs(1)));
        assert!(limiter.check_at("ip", t0 + Duration::from_secs(2)));
        assert!(!limiter.check_at("ip", t0 + Duration::from_secs(3)));
        assert!(!limiter.check_at("ip", t0 + Duration::from_secs(59)));
    }

    #[test]
    fn window_slides_per_request() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0));
        assert!(limiter.check_at("a", t0 + Duration::from_secs(5)));
        assert!(!limiter.check_at("a", t0 + Duration::from_secs(9)));
        // first hit ages out, second still counts
        assert!(limiter.check_at("a", t0 + Duration::from_secs(10)));
        assert!(!limiter.check_at("a", t0 + Duration::from_secs(14)));
        assert!(limiter.check_at("a", t0 + Duration::from_secs(15)));
    }

    #[test]
    fn rejected_requests_do_not_extend_the_window() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0));
        assert!(!limiter.check_at("a", t0 + Duration::from_secs(9)));
        assert!(limiter.check_at("a", t0 + Duration::from_secs(10)));
    }

    #[test]
    fn callers_are_independent_and_pruned() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0));
        assert!(limiter.check_at("b", t0));
        assert!(!limiter.check_at("a", t0));
        assert_eq!(limiter.tracked_callers(), 2);
        assert!(limiter.check_at("c", t0 + Duration::from_secs(20)));
        assert_eq!(limiter.tracked_callers(), 1);
    }
}
