//! Rolling-window rate limiter

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Allows at most `limit` acquisitions within any `window`
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// Record an acquisition if the window has room
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        while timestamps
            .front()
            .is_some_and(|ts| now.duration_since(*ts) >= self.window)
        {
            timestamps.pop_front();
        }
        if timestamps.len() >= self.limit {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Acquisitions still available in the current window
    pub fn remaining(&self) -> usize {
        let now = Instant::now();
        let timestamps = self.timestamps.lock();
        let live = timestamps
            .iter()
            .filter(|ts| now.duration_since(**ts) < self.window)
            .count();
        self.limit.saturating_sub(live)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_limit_within_window() {
        let limiter = RateLimiter::default();
        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rolls() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_acquire());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(limiter.remaining(), 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }
}
