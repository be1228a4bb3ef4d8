// src/rate_limiter.rs

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::EtlError;

/// Call budget for one upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    max_calls: u32,
    window: Duration,
}

impl Quota {
    pub const DEFAULT_MAX_CALLS: u32 = 5;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

    pub fn new(max_calls: u32, window: Duration) -> Result<Self, EtlError> {
        if max_calls == 0 {
            return Err(EtlError::InvalidInput("max_calls must be positive".into()));
        }
        if window.is_zero() {
            return Err(EtlError::InvalidInput("rate limit window must be positive".into()));
        }
        Ok(Quota { max_calls, window })
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for Quota {
    fn default() -> Self {
        Quota {
            max_calls: Self::DEFAULT_MAX_CALLS,
            window: Self::DEFAULT_WINDOW,
        }
    }
}

struct SlidingWindow {
    quota: Quota,
    calls: VecDeque<Instant>,
}

impl SlidingWindow {
    fn new(quota: Quota) -> Self {
        SlidingWindow {
            quota,
            calls: VecDeque::with_capacity(quota.max_calls as usize),
        }
    }

    /// Records a call and returns `None` if a slot is free, otherwise how long to wait.
    fn try_take(&mut self, now: Instant) -> Option<Duration> {
        while let Some(&oldest) = self.calls.front() {
            if now.duration_since(oldest) >= self.quota.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        if self.calls.len() < self.quota.max_calls as usize {
            self.calls.push_back(now);
            return None;
        }

        self.calls
            .front()
            .map(|&oldest| self.quota.window.saturating_sub(now.duration_since(oldest)))
    }
}

/// Per-source sliding-window limiter.
///
/// Sources without a registered quota are never throttled.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, SlidingWindow>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(mut self, source_id: impl Into<String>, quota: Quota) -> Self {
        self.windows
            .get_mut()
            .insert(source_id.into(), SlidingWindow::new(quota));
        self
    }

    pub async fn set_quota(&self, source_id: impl Into<String>, quota: Quota) {
        self.windows
            .lock()
            .await
            .insert(source_id.into(), SlidingWindow::new(quota));
    }

    pub async fn acquire(&self, source_id: &str) {
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                match windows.get_mut(source_id) {
                    Some(window) => window.try_take(Instant::now()),
                    None => None,
                }
            };

            match wait {
                None => return,
                Some(delay) => {
                    debug!(
                        source = source_id,
                        wait_ms = delay.as_millis() as u64,
                        "rate limit reached, waiting for a slot"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_rejects_zero_values() {
        assert!(Quota::new(0, Duration::from_secs(1)).is_err());
        assert!(Quota::new(1, Duration::ZERO).is_err());
        assert_eq!(Quota::default().max_calls(), 5);
    }

    #[test]
    fn sliding_window_frees_slot_after_window() {
        let quota = Quota::new(2, Duration::from_secs(10)).unwrap();
        let mut window = SlidingWindow::new(quota);
        let start = Instant::now();

        assert_eq!(window.try_take(start), None);
        assert_eq!(window.try_take(start + Duration::from_secs(1)), None);
        assert_eq!(
            window.try_take(start + Duration::from_secs(4)),
            Some(Duration::from_secs(6))
        );
        assert_eq!(window.try_take(start + Duration::from_secs(10)), None);
    }
}
