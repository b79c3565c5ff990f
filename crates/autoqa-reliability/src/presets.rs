//! Named circuit breaker presets for the providers wired into
//! `autoqa-intelligence`. Mirrors `riptide-reliability`'s own
//! per-dependency-class presets, narrowed to the fields this breaker
//! actually uses (`half_open_max_in_flight` isn't modeled: a half-open
//! window here always allows exactly one probe).

use autoqa_config::CircuitBreakerConfig;
use std::time::Duration;

pub fn llm_provider() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 5,
        reset_timeout: Duration::from_secs(30),
        monitoring_period: Duration::from_secs(60),
    }
}

pub fn blob_store() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 10,
        reset_timeout: Duration::from_secs(10),
        monitoring_period: Duration::from_secs(30),
    }
}

pub fn browser_runtime() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 3,
        reset_timeout: Duration::from_secs(60),
        monitoring_period: Duration::from_secs(120),
    }
}

pub fn aggressive() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 2,
        reset_timeout: Duration::from_secs(5),
        monitoring_period: Duration::from_secs(15),
    }
}

pub fn permissive() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 20,
        reset_timeout: Duration::from_secs(5),
        monitoring_period: Duration::from_secs(30),
    }
}
