// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rate limiting of outbound provider calls.
//!
//! Every handler receives one [`RateLimiter`] at construction. Handlers call
//! [`RateLimiter::accept`] before each backend request. Limiters are per account,
//! so two accounts of the same provider type each get the configured rate.

use crate::config::RateLimiterOptions;
use crate::dns_errors::ConfigError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Throttles outbound calls of one handler.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Waits until the next call is allowed.
    async fn accept(&self);

    /// Takes a token if one is available without waiting.
    fn try_accept(&self) -> bool;

    /// Configured queries per second, `None` for unlimited.
    fn qps(&self) -> Option<f64>;
}

/// Fail-open limiter used when no limits are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAllow;

#[async_trait]
impl RateLimiter for AlwaysAllow {
    async fn accept(&self) {}

    fn try_accept(&self) -> bool {
        true
    }

    fn qps(&self) -> Option<f64> {
        None
    }
}

/// Token bucket state.
///
/// Tokens may become negative in [`TokenBucketRateLimiter::accept`]: a caller
/// reserves a token in advance and sleeps for the deficit.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    rate_per_sec: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(qps: f64, burst: u32) -> Self {
        let capacity = f64::from(burst);
        Self {
            tokens: capacity,
            capacity,
            rate_per_sec: qps,
            last_update: Instant::now(),
        }
    }

    fn replenish(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_update = now;
    }

    fn try_consume(&mut self) -> bool {
        self.replenish();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Consumes one token and returns how long the caller has to wait for it.
    fn reserve(&mut self) -> Duration {
        self.replenish();
        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.rate_per_sec)
        }
    }
}

/// Token bucket limiter with a sustained rate of `qps` and a burst capacity.
#[derive(Debug)]
pub struct TokenBucketRateLimiter {
    qps: f64,
    bucket: Mutex<TokenBucket>,
}

impl TokenBucketRateLimiter {
    /// Creates a limiter that starts with a full bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if `qps` is not positive or `burst` is zero.
    pub fn new(qps: f64, burst: u32) -> Result<Self, ConfigError> {
        if qps <= 0.0 || !qps.is_finite() {
            return Err(ConfigError::InvalidProperty {
                key: "rateLimits.qps".into(),
                reason: format!("qps must be positive, got {qps}"),
            });
        }
        if burst == 0 {
            return Err(ConfigError::InvalidProperty {
                key: "rateLimits.burst".into(),
                reason: "burst must be at least 1".into(),
            });
        }
        Ok(Self {
            qps,
            bucket: Mutex::new(TokenBucket::new(qps, burst)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TokenBucket> {
        self.bucket
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RateLimiter for TokenBucketRateLimiter {
    async fn accept(&self) {
        let wait = self.lock().reserve();
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis(), "Rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    fn try_accept(&self) -> bool {
        self.lock().try_consume()
    }

    fn qps(&self) -> Option<f64> {
        Some(self.qps)
    }
}

/// Picks the effective limits: configured ones if enabled, else the registration defaults if enabled.
#[must_use]
pub fn select_rate_limits(
    configured: Option<&RateLimiterOptions>,
    defaults: Option<&RateLimiterOptions>,
) -> Option<RateLimiterOptions> {
    configured
        .filter(|o| o.enabled)
        .or_else(|| defaults.filter(|o| o.enabled))
        .cloned()
}

/// Builds a limiter from options, falling back to [`AlwaysAllow`].
///
/// # Errors
///
/// Returns an error if enabled options carry an invalid rate or burst.
pub fn new_rate_limiter(
    options: Option<&RateLimiterOptions>,
) -> Result<Arc<dyn RateLimiter>, ConfigError> {
    match options {
        Some(o) if o.enabled => Ok(Arc::new(TokenBucketRateLimiter::new(o.qps, o.burst)?)),
        _ => Ok(Arc::new(AlwaysAllow)),
    }
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod rate_limiter_tests;
