//! Circuit breaker with phase-based locking: the decision of whether to
//! proceed and the recording of the result each hold the state mutex for
//! a single synchronous critical section, never across the awaited call
//! itself, the same shape `riptide-pool`'s breaker uses to avoid holding a
//! guard across an await point, adapted here to a consecutive-failure
//! counter instead of a rolling failure-rate window.

use autoqa_config::CircuitBreakerConfig;
use autoqa_types::CancelToken;
use std::future::Future;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit open")]
    Open,
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Underlying(E),
}

enum Internal {
    Closed {
        consecutive_failures: u32,
        window_started: Instant,
    },
    Open {
        opened_at: Instant,
        failure_count: u32,
    },
    HalfOpen {
        probe_in_flight: bool,
    },
}

enum Decision {
    Proceed,
    ProceedAsProbe,
    Reject,
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<Internal>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(Internal::Closed {
                consecutive_failures: 0,
                window_started: Instant::now(),
            }),
        }
    }

    pub fn failure_count(&self) -> u32 {
        match &*self.state.lock().expect("breaker mutex poisoned") {
            Internal::Closed { consecutive_failures, .. } => *consecutive_failures,
            Internal::Open { failure_count, .. } => *failure_count,
            Internal::HalfOpen { .. } => 0,
        }
    }

    pub fn state(&self) -> BreakerState {
        match &*self.state.lock().expect("breaker mutex poisoned") {
            Internal::Closed { .. } => BreakerState::Closed,
            Internal::Open { .. } => BreakerState::Open,
            Internal::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    fn decide(&self) -> Decision {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        match &*state {
            Internal::Closed { .. } => Decision::Proceed,
            Internal::Open { opened_at, .. } => {
                if opened_at.elapsed() >= self.config.reset_timeout {
                    info!(breaker = %self.name, "circuit transitioning to half-open");
                    *state = Internal::HalfOpen {
                        probe_in_flight: true,
                    };
                    Decision::ProceedAsProbe
                } else {
                    Decision::Reject
                }
            }
            Internal::HalfOpen { probe_in_flight } => {
                if *probe_in_flight {
                    Decision::Reject
                } else {
                    *state = Internal::HalfOpen {
                        probe_in_flight: true,
                    };
                    Decision::ProceedAsProbe
                }
            }
        }
    }

    fn record(&self, is_probe: bool, success: bool) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        *state = match (&*state, is_probe, success) {
            (Internal::HalfOpen { .. }, true, true) => {
                info!(breaker = %self.name, "circuit closed after successful probe");
                Internal::Closed {
                    consecutive_failures: 0,
                    window_started: Instant::now(),
                }
            }
            (Internal::HalfOpen { .. }, true, false) => {
                warn!(breaker = %self.name, "circuit reopened after failed probe");
                Internal::Open {
                    opened_at: Instant::now(),
                    failure_count: 1,
                }
            }
            (Internal::Closed { window_started, consecutive_failures }, false, false) => {
                let (failures, started) = if window_started.elapsed() > self.config.monitoring_period
                {
                    (1, Instant::now())
                } else {
                    (consecutive_failures + 1, *window_started)
                };
                if failures >= self.config.failure_threshold {
                    warn!(breaker = %self.name, failures, "circuit opened");
                    Internal::Open {
                        opened_at: Instant::now(),
                        failure_count: failures,
                    }
                } else {
                    Internal::Closed {
                        consecutive_failures: failures,
                        window_started: started,
                    }
                }
            }
            (Internal::Closed { window_started, .. }, false, true) => Internal::Closed {
                consecutive_failures: 0,
                window_started: *window_started,
            },
            (other, _, _) => match other {
                Internal::Closed { consecutive_failures, window_started } => Internal::Closed {
                    consecutive_failures: *consecutive_failures,
                    window_started: *window_started,
                },
                Internal::Open { opened_at, failure_count } => Internal::Open {
                    opened_at: *opened_at,
                    failure_count: *failure_count,
                },
                Internal::HalfOpen { probe_in_flight } => {
                    Internal::HalfOpen { probe_in_flight: *probe_in_flight }
                }
            },
        };
    }

    /// Releases a probe slot without recording a result, used when the
    /// caller's cancellation token fires before the call resolves.
    fn release_probe(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        if let Internal::HalfOpen { probe_in_flight } = &mut *state {
            *probe_in_flight = false;
        }
    }

    /// Wraps `f` with the breaker's admission decision. Cancellation races
    /// the call itself, per spec.md §5's "wraps the provider call
    /// synchronously with respect to the caller's cancellation".
    pub async fn call<F, Fut, T, E>(
        &self,
        token: &CancelToken,
        f: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let is_probe = match self.decide() {
            Decision::Reject => return Err(BreakerError::Open),
            Decision::Proceed => false,
            Decision::ProceedAsProbe => true,
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                if is_probe {
                    self.release_probe();
                }
                Err(BreakerError::Cancelled)
            }
            result = f() => {
                match result {
                    Ok(value) => {
                        self.record(is_probe, true);
                        Ok(value)
                    }
                    Err(err) => {
                        self.record(is_probe, false);
                        Err(BreakerError::Underlying(err))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(threshold: u32, reset_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: Duration::from_millis(reset_ms),
            monitoring_period: Duration::from_secs(60),
        }
    }

    async fn fails() -> Result<(), &'static str> {
        Err("boom")
    }

    async fn succeeds() -> Result<(), &'static str> {
        Ok(())
    }

    #[tokio::test]
    async fn opens_after_threshold_and_recovers_after_reset_timeout() {
        let breaker = CircuitBreaker::new("provider-a", config(5, 100));
        let token = CancelToken::new();

        for _ in 0..5 {
            let result = breaker.call(&token, fails).await;
            assert!(matches!(result, Err(BreakerError::Underlying("boom"))));
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        let result = breaker.call(&token, fails).await;
        assert!(matches!(result, Err(BreakerError::Open)));

        tokio::time::sleep(Duration::from_millis(120)).await;

        let result = breaker.call(&token, succeeds).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);

        assert!(breaker.call(&token, succeeds).await.is_ok());
    }

    #[tokio::test]
    async fn failed_probe_reopens_the_circuit() {
        let breaker = CircuitBreaker::new("provider-b", config(1, 10));
        let token = CancelToken::new();

        assert!(breaker.call(&token, fails).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.call(&token, fails).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn cancellation_releases_the_probe_slot() {
        let breaker = CircuitBreaker::new("provider-c", config(1, 5));
        let token = CancelToken::new();
        assert!(breaker.call(&token, fails).await.is_err());

        tokio::time::sleep(Duration::from_millis(10)).await;

        let cancel_token = CancelToken::new();
        cancel_token.cancel();
        let result = breaker
            .call(&cancel_token, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), &'static str>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Cancelled)));

        // The probe slot was released, so the next real attempt can proceed.
        assert!(breaker.call(&token, succeeds).await.is_ok());
    }
}
