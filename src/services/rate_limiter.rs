use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::{sleep, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window rate limiter shared by every concurrent evaluation task
#[derive(Debug)]
pub struct SharedRateLimiter {
    /// Timestamps of recent requests (sliding window)
    request_timestamps: TokioMutex<Vec<Instant>>,
    /// Maximum requests allowed per minute
    rate_limit_per_minute: u32,
}

impl SharedRateLimiter {
    pub fn new(rate_limit_per_minute: u32) -> Self {
        Self {
            request_timestamps: TokioMutex::new(Vec::new()),
            rate_limit_per_minute: rate_limit_per_minute.max(1),
        }
    }

    pub fn limit(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Wait until a request slot is free, then claim it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.request_timestamps.lock().await;
                let now = Instant::now();
                match wait_needed(&mut timestamps, now, self.rate_limit_per_minute) {
                    None => {
                        timestamps.push(now);
                        return;
                    }
                    Some(wait) => wait,
                }
            };
            // Lock released while sleeping so other tasks can re-check
            sleep(wait + Duration::from_millis(100)).await;
        }
    }
}

/// Drop timestamps older than the window and return how long to wait for a
/// free slot, `None` when one is free now
fn wait_needed(timestamps: &mut Vec<Instant>, now: Instant, limit: u32) -> Option<Duration> {
    timestamps.retain(|&t| now.saturating_duration_since(t) < WINDOW);

    if timestamps.len() < limit as usize {
        return None;
    }
    timestamps
        .first()
        .map(|&oldest| WINDOW.saturating_sub(now.saturating_duration_since(oldest)))
}
