//! Local fixed-window rate limiter resource.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use flow::RateLimit;
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Deserialize)]
pub struct LocalRateLimitConfig {
    #[serde(default = "default_count")]
    pub count: u64,
    #[serde(default = "default_interval")]
    pub interval: String,
}

fn default_count() -> u64 {
    1000
}

fn default_interval() -> String {
    "1s".to_string()
}

struct Window {
    started: Instant,
    used: u64,
}

pub struct LocalRateLimit {
    count: u64,
    interval: Duration,
    window: Mutex<Window>,
}

impl LocalRateLimit {
    pub fn new(count: u64, interval: Duration) -> Self {
        Self {
            count: count.max(1),
            interval,
            window: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
        }
    }

    pub fn from_config(config: &LocalRateLimitConfig) -> Result<Self, String> {
        Ok(Self::new(config.count, flow::parse_duration(&config.interval)?))
    }
}

#[async_trait]
impl RateLimit for LocalRateLimit {
    async fn access(&self) -> Duration {
        let mut window = self.window.lock().await;
        let elapsed = window.started.elapsed();
        if elapsed >= self.interval {
            window.started = Instant::now();
            window.used = 0;
        }
        if window.used < self.count {
            window.used += 1;
            Duration::ZERO
        } else {
            // Caller must wait out the remainder of the window.
            self.interval.saturating_sub(elapsed)
        }
    }
}
