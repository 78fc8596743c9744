//! Process-wide token bucket limiter.
//!
//! One instance is built at start-up and injected into the router; every
//! request, whatever its route, draws from the same bucket.

use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common_http_errors::ApiError;
use parking_lot::Mutex;
use tracing::warn;

use crate::app::AppState;
use crate::config::RateLimitConfig;

pub struct RateLimiter {
    enabled: bool,
    refill_per_second: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    /// Full bucket whose clock starts at `origin`.
    pub fn starting_at(config: &RateLimitConfig, origin: Instant) -> Self {
        let burst = f64::from(config.burst);
        Self {
            enabled: config.enabled,
            refill_per_second: config.refill_per_second,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: origin,
            }),
        }
    }

    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Refill for the time elapsed up to `now`, then try to take one token.
    /// The whole read-modify-write runs under the bucket lock, so concurrent
    /// callers can never admit more than the burst between refills.
    pub fn allow_at(&self, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let mut bucket = self.bucket.lock();
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        if elapsed > Duration::ZERO {
            bucket.tokens =
                (bucket.tokens + elapsed.as_secs_f64() * self.refill_per_second).min(self.burst);
            bucket.last_refill = now;
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time for one token to be added back.
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refill_per_second)
    }
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.limiter.allow() {
        warn!(path = %request.uri().path(), "rate limit exceeded");
        state.metrics.guard_rejection("rate_limit");
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}
