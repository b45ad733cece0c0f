use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Sliding-window limiter shared by every matcher worker of one service.
///
/// Remembers the start times of the last `max_requests` calls. A new call waits
/// until the oldest of them is at least `window` old.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    recent: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            recent: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn per_second(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Wait for a free slot and claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut recent = self.recent.lock().await;
                let now = Instant::now();

                while let Some(&oldest) = recent.front() {
                    if now.duration_since(oldest) >= self.window {
                        recent.pop_front();
                    } else {
                        break;
                    }
                }

                if recent.len() < self.max_requests {
                    recent.push_back(now);
                    return;
                }

                let oldest = recent.front().copied().unwrap_or(now);
                self.window.saturating_sub(now.duration_since(oldest))
            };

            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            sleep(wait).await;
        }
    }
}
