//! Sliding-window request rate limiter

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Limits requests per window; shared by every concurrent call on a provider
pub struct RateLimiter {
    requests_per_window: u32,
    window: Duration,
    last_requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limit to `requests_per_minute`; zero disables limiting
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_window: requests_per_minute,
            window: Duration::from_secs(60),
            last_requests: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Wait until a request slot is free, then claim it
    pub async fn acquire(&self) {
        if self.requests_per_window == 0 {
            return;
        }
        loop {
            match self.try_claim().await {
                None => return,
                Some(wait) => {
                    tracing::debug!("Rate limit reached, waiting {}ms", wait.as_millis());
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Claim a slot, or return how long until the oldest one expires
    async fn try_claim(&self) -> Option<Duration> {
        let mut last = self.last_requests.lock().await;
        let now = Instant::now();

        while let Some(&front) = last.front() {
            if now.duration_since(front) >= self.window {
                last.pop_front();
            } else {
                break;
            }
        }

        if last.len() >= self.requests_per_window as usize {
            let oldest = last.front().copied().unwrap_or(now);
            let elapsed = now.duration_since(oldest);
            return Some(self.window.saturating_sub(elapsed) + Duration::from_millis(1));
        }

        last.push_back(now);
        None
    }

    /// Requests recorded in the current window
    pub async fn in_flight_window(&self) -> usize {
        let last = self.last_requests.lock().await;
        let now = Instant::now();
        last.iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_basic() {
        let limiter = RateLimiter::new(5);

        // Should be able to make 5 requests immediately
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.in_flight_window().await, 5);
    }

    #[tokio::test]
    async fn test_waits_for_window() {
        let limiter = RateLimiter::new(2).with_window(Duration::from_millis(50));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_zero_disables_limit() {
        let limiter = RateLimiter::new(0);
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.in_flight_window().await, 0);
    }
}
