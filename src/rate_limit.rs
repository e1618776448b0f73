use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Key under which all webhook deliveries share one budget
pub const WEBHOOK_KEY: &str = "webhook";

/// Sliding-window request limiter
pub struct RateLimiter {
    max: usize,
    window: Duration,
    /// tracks timestamps per key
    requests: HashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            requests: HashMap::new(),
        }
    }

    /// Records a request for `key` and returns `true` if it exceeds the limit.
    pub fn check_rate_limit(&mut self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &str, now: Instant) -> bool {
        let timestamps = self.requests.entry(key.to_string()).or_default();

        // Remove timestamps older than window
        timestamps.retain(|&t| now.duration_since(t) < self.window);

        if timestamps.len() < self.max {
            timestamps.push(now);
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_within_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(!limiter.check_at(WEBHOOK_KEY, now));
        assert!(!limiter.check_at(WEBHOOK_KEY, now + Duration::from_secs(1)));
        assert!(limiter.check_at(WEBHOOK_KEY, now + Duration::from_secs(2)));
    }

    #[test]
    fn window_slides() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(!limiter.check_at(WEBHOOK_KEY, now));
        assert!(limiter.check_at(WEBHOOK_KEY, now + Duration::from_secs(30)));
        assert!(!limiter.check_at(WEBHOOK_KEY, now + Duration::from_secs(61)));
    }

    #[test]
    fn keys_are_independent() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(!limiter.check_rate_limit("a"));
        assert!(!limiter.check_rate_limit("b"));
        assert!(limiter.check_rate_limit("a"));
    }
}
