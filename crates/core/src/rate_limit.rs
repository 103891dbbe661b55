//! Sliding-Window Rate Limiter
//!
//! Counts calls over a trailing window and makes callers wait once the
//! ceiling is reached. Model calls and web calls each get their own limiter.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default window length: one minute.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Counter-and-sleep limiter over a sliding time window.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    max_calls: u32,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing `max_calls` per minute. Zero is treated as one.
    pub fn per_minute(name: &'static str, max_calls: u32) -> Self {
        Self::with_window(name, max_calls, DEFAULT_WINDOW)
    }

    pub fn with_window(name: &'static str, max_calls: u32, window: Duration) -> Self {
        Self {
            name,
            max_calls: max_calls.max(1),
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    /// Wait until a call is permitted, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                while let Some(oldest) = calls.front() {
                    if now.duration_since(*oldest) >= self.window {
                        calls.pop_front();
                    } else {
                        break;
                    }
                }
                if (calls.len() as u32) < self.max_calls {
                    calls.push_back(now);
                    return;
                }
                match calls.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };
            tracing::info!(
                limiter = self.name,
                wait_ms = wait.as_millis() as u64,
                "rate limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls recorded within the current window.
    pub async fn in_flight(&self) -> usize {
        let calls = self.calls.lock().await;
        let now = Instant::now();
        calls
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}
