//! Per-Adapter Rate Limiting
//!
//! Sliding-window limiter: each adapter admits at most `max_requests` calls
//! per `window`, queueing excess callers locally until a slot frees up. This
//! is the pipeline's only admission control; the dispatcher adds no queueing
//! of its own.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Requests-per-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    /// Admission timestamps within the current window
    history: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a request slot is available, then claim it
    pub async fn acquire(&self) {
        loop {
            let wait_until = {
                let mut history = self.history.lock().await;
                let now = Instant::now();
                while let Some(front) = history.front() {
                    if *front + self.window <= now {
                        history.pop_front();
                    } else {
                        break;
                    }
                }
                // Oldest admission decides when the next slot opens
                match history.front() {
                    Some(front) if (history.len() as u32) >= self.max_requests => {
                        *front + self.window
                    }
                    _ => {
                        history.push_back(now);
                        return;
                    }
                }
            };
            trace!(?wait_until, "Rate limit reached, queueing");
            sleep_until(wait_until).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_capacity_immediately() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queues_excess_until_window_rolls() {
        let limiter = RateLimiter::new(2, Duration::from_secs(5));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        // Third call must wait for the first admission to age out
        limiter.acquire().await;
        assert!(Instant::now() >= start + Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_all_admitted() {
        let limiter = std::sync::Arc::new(RateLimiter::new(1, Duration::from_millis(100)));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
