//! Lazy-refill token bucket. Two independent instances back the provider
//! admission path: one counting raw requests, one counting estimated
//! tokens (spec.md §4.1).
//!
//! Unlike a ticking background refill, the bucket computes how much
//! capacity has accrued at the moment of `consume`, which keeps the type
//! free of its own task and trivial to unit test with a manual clock.

use autoqa_types::Clock;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("rate limited, retry after {retry_after:?}")]
pub struct RateLimited {
    pub retry_after: Duration,
}

struct Inner {
    capacity: f64,
    available: f64,
    last_refill: Instant,
}

/// One bucket over a fixed 60-second replenishment window.
pub struct TokenBucket {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl TokenBucket {
    pub fn new(capacity_per_minute: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity: capacity_per_minute as f64,
                available: capacity_per_minute as f64,
                last_refill: clock.monotonic(),
            }),
            clock,
            window: Duration::from_secs(60),
        }
    }

    fn rate_per_sec(&self, capacity: f64) -> f64 {
        capacity / self.window.as_secs_f64()
    }

    /// Succeeds and debits `amount` points, or fails with the duration
    /// until `amount` points would be available.
    pub fn consume(&self, amount: u64) -> Result<(), RateLimited> {
        let amount = amount as f64;
        let now = self.clock.monotonic();
        let mut state = self.inner.lock().expect("token bucket mutex poisoned");

        let elapsed = now.saturating_duration_since(state.last_refill);
        let rate = self.rate_per_sec(state.capacity);
        state.available = (state.available + elapsed.as_secs_f64() * rate).min(state.capacity);
        state.last_refill = now;

        if state.available >= amount {
            state.available -= amount;
            Ok(())
        } else {
            let deficit = amount - state.available;
            let retry_after = Duration::from_secs_f64(deficit / rate);
            Err(RateLimited { retry_after })
        }
    }

    pub fn available(&self) -> f64 {
        let now = self.clock.monotonic();
        let state = self.inner.lock().expect("token bucket mutex poisoned");
        let elapsed = now.saturating_duration_since(state.last_refill);
        let rate = self.rate_per_sec(state.capacity);
        (state.available + elapsed.as_secs_f64() * rate).min(state.capacity)
    }
}

/// `estimated = ceil(promptLength/4) + maxTokens` is computed by the caller
/// (`autoqa_types::ProviderRequest::estimated_tokens`); this pair is what
/// the Orchestrator holds per provider before dispatch (spec.md §4.1).
pub struct DualBucket {
    pub requests: TokenBucket,
    pub tokens: TokenBucket,
}

impl DualBucket {
    pub fn new(requests_per_minute: u64, tokens_per_minute: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            requests: TokenBucket::new(requests_per_minute, clock.clone()),
            tokens: TokenBucket::new(tokens_per_minute, clock),
        }
    }

    pub fn consume_request(&self) -> Result<(), RateLimited> {
        self.requests.consume(1)
    }

    pub fn consume_tokens(&self, estimated: u64) -> Result<(), RateLimited> {
        self.tokens.consume(estimated)
    }
}
