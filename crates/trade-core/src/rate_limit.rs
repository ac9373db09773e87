//! Sliding-window request limiter for outbound API calls.
//!
//! The Comtrade API enforces an hourly request quota that depends on the
//! access tier. [`RateLimiter`] keeps the timestamps of admitted requests
//! and delays callers until the oldest request leaves the window, so a run
//! never exceeds the quota. Being rate-limited is backpressure, not an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use trade_core::rate_limit::{ApiTier, RateLimiter};
//!
//! # async fn run() {
//! let limiter = RateLimiter::for_tier(ApiTier::Free);
//! limiter.acquire().await;
//! // ... issue the request
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// API access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiTier {
    /// Public preview endpoint, no key.
    Free,
    /// Subscription key present.
    Premium,
}

impl ApiTier {
    pub const FREE_REQUESTS_PER_HOUR: u32 = 100;
    pub const PREMIUM_REQUESTS_PER_HOUR: u32 = 10_000;

    /// Premium when a non-empty key is configured.
    pub fn from_api_key(api_key: Option<&str>) -> Self {
        match api_key {
            Some(k) if !k.trim().is_empty() => ApiTier::Premium,
            _ => ApiTier::Free,
        }
    }

    pub fn requests_per_hour(&self) -> u32 {
        match self {
            ApiTier::Free => Self::FREE_REQUESTS_PER_HOUR,
            ApiTier::Premium => Self::PREMIUM_REQUESTS_PER_HOUR,
        }
    }
}

/// Configuration for the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum admitted requests within any `window`. Always at least 1.
    pub max_requests: u32,

    /// Length of the rolling window.
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
        }
    }

    /// Hourly quota for the given tier.
    pub fn for_tier(tier: ApiTier) -> Self {
        Self::new(tier.requests_per_hour(), Duration::from_secs(3600))
    }
}

impl Default for RateLimitConfig {
    /// Free tier: 100 requests per hour.
    fn default() -> Self {
        Self::for_tier(ApiTier::Free)
    }
}

/// Injectable rate-limit state. Clones share the same window.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Admission times still inside the window, oldest first.
    requests: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            requests: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn for_tier(tier: ApiTier) -> Self {
        Self::new(RateLimitConfig::for_tier(tier))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit a request now, or return how long until a slot frees up.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut requests = self.requests.lock().await;
        self.admit(&mut requests, Instant::now())
    }

    /// Wait until a slot is available, then claim it.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire().await {
                Ok(()) => return,
                Err(wait) => {
                    tracing::info!(
                        wait_ms = %wait.as_millis(),
                        max_requests = self.config.max_requests,
                        "Rate limit reached, waiting for a free slot"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Number of admitted requests still inside the window.
    pub async fn in_flight(&self) -> usize {
        let mut requests = self.requests.lock().await;
        self.prune(&mut requests, Instant::now());
        requests.len()
    }

    /// Forget every recorded request.
    pub async fn reset(&self) {
        self.requests.lock().await.clear();
    }

    fn prune(&self, requests: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = requests.front() {
            if now.duration_since(oldest) >= self.config.window {
                requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn admit(&self, requests: &mut VecDeque<Instant>, now: Instant) -> Result<(), Duration> {
        self.prune(requests, now);

        if requests.len() < self.config.max_requests as usize {
            requests.push_back(now);
            return Ok(());
        }

        let oldest = requests.front().copied().unwrap_or(now);
        Err(self.config.window.saturating_sub(now.duration_since(oldest)))
    }
}
