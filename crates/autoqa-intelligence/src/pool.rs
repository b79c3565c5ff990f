//! Provider pool: one named `Provider` per entry, each wrapped in its own
//! `CircuitBreaker`, with a configured default and a single fallback
//! (spec.md §4.3).

use crate::providers::{Provider, ProviderError};
use autoqa_config::CircuitBreakerConfig;
use autoqa_reliability::{BreakerError, BreakerState, CircuitBreaker};
use autoqa_types::{CancelToken, GenerationResult, ProviderFailureClass, ProviderRequest, RetryAfter, ValidationResult};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum IntelligenceError {
    #[error("rate limited, retry after {0}")]
    RateLimited(RetryAfter),
    #[error("circuit open for provider {provider}")]
    CircuitOpen { provider: String },
    #[error("provider error ({class:?}): {message}")]
    Provider {
        class: ProviderFailureClass,
        message: String,
    },
    #[error("all providers failed")]
    AllProvidersFailed,
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<ProviderError> for IntelligenceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transient(message) => IntelligenceError::Provider {
                class: ProviderFailureClass::Transient,
                message,
            },
            ProviderError::Fatal(message) => IntelligenceError::Provider {
                class: ProviderFailureClass::Fatal,
                message,
            },
        }
    }
}

fn from_breaker_error(provider: &str, err: BreakerError<ProviderError>) -> IntelligenceError {
    match err {
        BreakerError::Open => IntelligenceError::CircuitOpen {
            provider: provider.to_string(),
        },
        BreakerError::Cancelled => IntelligenceError::Provider {
            class: ProviderFailureClass::Transient,
            message: "cancelled".to_string(),
        },
        BreakerError::Underlying(inner) => inner.into(),
    }
}

/// Non-fallback-eligible per spec.md §7's propagation policy: `RateLimited`
/// always surfaces immediately, and a `Fatal` classification means retrying
/// against a different provider wouldn't change the outcome.
fn should_fallback(err: &IntelligenceError) -> bool {
    !matches!(
        err,
        IntelligenceError::RateLimited(_)
            | IntelligenceError::Provider {
                class: ProviderFailureClass::Fatal,
                ..
            }
    )
}

struct Entry {
    provider: Arc<dyn Provider>,
    breaker: CircuitBreaker,
}

#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub available: bool,
    pub circuit_state: BreakerState,
    pub failure_count: u32,
}

pub struct ProviderPool {
    entries: HashMap<String, Entry>,
    default_name: String,
    fallback_name: Option<String>,
}

pub struct ProviderPoolBuilder {
    entries: HashMap<String, Entry>,
    default_name: Option<String>,
    fallback_name: Option<String>,
}

impl ProviderPoolBuilder {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            default_name: None,
            fallback_name: None,
        }
    }

    pub fn register(mut self, provider: Arc<dyn Provider>, config: CircuitBreakerConfig) -> Self {
        let name = provider.name().to_string();
        let breaker = CircuitBreaker::new(name.clone(), config);
        self.entries.insert(name, Entry { provider, breaker });
        self
    }

    pub fn default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    pub fn fallback_provider(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<ProviderPool, IntelligenceError> {
        let default_name = self
            .default_name
            .ok_or_else(|| IntelligenceError::Configuration("no default provider set".into()))?;
        if !self.entries.contains_key(&default_name) {
            return Err(IntelligenceError::Configuration(format!(
                "default provider {default_name} was never registered"
            )));
        }
        if let Some(fallback) = &self.fallback_name {
            if !self.entries.contains_key(fallback) {
                return Err(IntelligenceError::Configuration(format!(
                    "fallback provider {fallback} was never registered"
                )));
            }
        }
        Ok(ProviderPool {
            entries: self.entries,
            default_name,
            fallback_name: self.fallback_name,
        })
    }
}

impl Default for ProviderPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderPool {
    pub fn builder() -> ProviderPoolBuilder {
        ProviderPoolBuilder::new()
    }

    async fn call_named(
        &self,
        name: &str,
        request: &ProviderRequest,
        cancel: &CancelToken,
    ) -> Result<GenerationResult, IntelligenceError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| IntelligenceError::Configuration(format!("unknown provider {name}")))?;
        entry
            .breaker
            .call(cancel, || entry.provider.generate(request))
            .await
            .map_err(|err| from_breaker_error(name, err))
    }

    /// Tries the default provider; on any error other than `RateLimited`
    /// or a `Fatal` provider error, tries the configured fallback once.
    pub async fn generate(
        &self,
        request: &ProviderRequest,
        cancel: &CancelToken,
    ) -> Result<GenerationResult, IntelligenceError> {
        let primary = self.call_named(&self.default_name, request, cancel).await;
        let primary_err = match primary {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        if !should_fallback(&primary_err) {
            return Err(primary_err);
        }

        let Some(fallback_name) = &self.fallback_name else {
            return Err(primary_err);
        };
        if fallback_name == &self.default_name {
            return Err(primary_err);
        }

        warn!(
            default = %self.default_name,
            fallback = %fallback_name,
            error = %primary_err,
            "falling back to secondary provider"
        );

        match self.call_named(fallback_name, request, cancel).await {
            Ok(result) => Ok(result),
            Err(fallback_err) if should_fallback(&fallback_err) => {
                Err(IntelligenceError::AllProvidersFailed)
            }
            Err(fallback_err) => Err(fallback_err),
        }
    }

    pub async fn validate(
        &self,
        name: &str,
        code: &str,
        cancel: &CancelToken,
    ) -> Result<ValidationResult, IntelligenceError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| IntelligenceError::Configuration(format!("unknown provider {name}")))?;
        entry
            .breaker
            .call(cancel, || entry.provider.validate(code))
            .await
            .map_err(|err| from_breaker_error(name, err))
    }

    pub fn status(&self) -> HashMap<String, ProviderStatus> {
        self.entries
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    ProviderStatus {
                        available: entry.breaker.state() != BreakerState::Open,
                        circuit_state: entry.breaker.state(),
                        failure_count: entry.breaker.failure_count(),
                    },
                )
            })
            .collect()
    }
}

/// Estimated-tokens admission gate, applied by the Orchestrator before
/// `ProviderPool::generate` (spec.md §4.1). Kept here as a thin wrapper so
/// call sites read `gate.admit(&request)?` rather than reconstructing the
/// dual-bucket dance inline.
pub struct AdmissionGate {
    buckets: autoqa_reliability::DualBucket,
}

impl AdmissionGate {
    pub fn new(buckets: autoqa_reliability::DualBucket) -> Self {
        Self { buckets }
    }

    pub fn admit(&self, request: &ProviderRequest) -> Result<(), IntelligenceError> {
        self.buckets
            .consume_request()
            .map_err(|e| IntelligenceError::RateLimited(RetryAfter(e.retry_after)))?;
        self.buckets
            .consume_tokens(request.estimated_tokens())
            .map_err(|e| IntelligenceError::RateLimited(RetryAfter(e.retry_after)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Provider;
    use async_trait::async_trait;
    use autoqa_types::{ManualClock, ProviderOptions};
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    struct AlwaysFails {
        name: String,
        calls: AtomicU32,
        class: ProviderFailureClass,
    }

    #[async_trait]
    impl Provider for AlwaysFails {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate(&self, _request: &ProviderRequest) -> Result<GenerationResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(match self.class {
                ProviderFailureClass::Transient => ProviderError::Transient("down".into()),
                ProviderFailureClass::Fatal => ProviderError::Fatal("bad request".into()),
            })
        }

        async fn validate(&self, _code: &str) -> Result<ValidationResult, ProviderError> {
            Ok(ValidationResult::default())
        }
    }

    struct AlwaysSucceeds {
        name: String,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Provider for AlwaysSucceeds {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate(&self, _request: &ProviderRequest) -> Result<GenerationResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerationResult {
                code: "ok".into(),
                explanation: None,
                confidence: 0.9,
                tokens_used: 10,
                model_name: "m".into(),
                provider_name: self.name.clone(),
            })
        }

        async fn validate(&self, _code: &str) -> Result<ValidationResult, ProviderError> {
            Ok(ValidationResult::default())
        }
    }

    fn breaker_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: StdDuration::from_secs(60),
            monitoring_period: StdDuration::from_secs(60),
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            prompt: "hello".into(),
            options: ProviderOptions::default(),
        }
    }

    #[tokio::test]
    async fn transient_failure_falls_back_once() {
        let primary = Arc::new(AlwaysFails {
            name: "primary".into(),
            calls: AtomicU32::new(0),
            class: ProviderFailureClass::Transient,
        });
        let fallback = Arc::new(AlwaysSucceeds {
            name: "fallback".into(),
            calls: AtomicU32::new(0),
        });
        let pool = ProviderPool::builder()
            .register(primary.clone(), breaker_config())
            .register(fallback.clone(), breaker_config())
            .default_provider("primary")
            .fallback_provider("fallback")
            .build()
            .unwrap();

        let cancel = CancelToken::new();
        let result = pool.generate(&request(), &cancel).await.unwrap();
        assert_eq!(result.provider_name, "fallback");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_failure_never_falls_back() {
        let primary = Arc::new(AlwaysFails {
            name: "primary".into(),
            calls: AtomicU32::new(0),
            class: ProviderFailureClass::Fatal,
        });
        let fallback = Arc::new(AlwaysSucceeds {
            name: "fallback".into(),
            calls: AtomicU32::new(0),
        });
        let pool = ProviderPool::builder()
            .register(primary.clone(), breaker_config())
            .register(fallback.clone(), breaker_config())
            .default_provider("primary")
            .fallback_provider("fallback")
            .build()
            .unwrap();

        let cancel = CancelToken::new();
        let err = pool.generate(&request(), &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            IntelligenceError::Provider {
                class: ProviderFailureClass::Fatal,
                ..
            }
        ));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rate_limit_exchange_allows_some_and_limits_the_rest() {
        let clock = ManualClock::new(Utc::now());
        let gate = AdmissionGate::new(autoqa_reliability::DualBucket::new(2, 100, clock));
        let provider = Arc::new(AlwaysSucceeds {
            name: "primary".into(),
            calls: AtomicU32::new(0),
        });
        let pool = ProviderPool::builder()
            .register(provider, breaker_config())
            .default_provider("primary")
            .build()
            .unwrap();
        let cancel = CancelToken::new();

        let mut successes = 0;
        let mut rate_limited = 0;
        for _ in 0..5 {
            match gate.admit(&request()) {
                Ok(()) => {
                    pool.generate(&request(), &cancel).await.unwrap();
                    successes += 1;
                }
                Err(IntelligenceError::RateLimited(RetryAfter(retry_after))) => {
                    assert!(retry_after <= StdDuration::from_secs(60));
                    rate_limited += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert!(successes >= 1);
        assert!(rate_limited >= 1);
    }

    #[tokio::test]
    async fn status_reports_open_circuit_after_threshold() {
        let primary = Arc::new(AlwaysFails {
            name: "primary".into(),
            calls: AtomicU32::new(0),
            class: ProviderFailureClass::Transient,
        });
        let pool = ProviderPool::builder()
            .register(primary, breaker_config())
            .default_provider("primary")
            .build()
            .unwrap();

        let cancel = CancelToken::new();
        let _ = pool.generate(&request(), &cancel).await;
        let status = pool.status();
        assert_eq!(status["primary"].circuit_state, BreakerState::Open);
        assert!(!status["primary"].available);
    }
}
