//! Environment-variable configuration for the AutoQA control plane.
//! Every knob named in the component design is collected here so the
//! orchestrator's startup path has a single place to fail fast with exit
//! code 64 on a bad config, rather than each component validating its own
//! slice independently.

pub mod env;

use env::{EnvError, EnvLoader};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[from] EnvError);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone)]
pub struct TokenBucketConfig {
    pub tokens_per_minute: u64,
    pub requests_per_minute: u64,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub monitoring_period: Duration,
}

#[derive(Debug, Clone)]
pub struct FlowControllerConfig {
    pub max_buffer_size: usize,
    pub max_memory_usage: u64,
    pub high_water_mark_pct: f64,
    pub low_water_mark_pct: f64,
    pub processing_rate: u64,
    pub slow_consumer_threshold: Duration,
}

#[derive(Debug, Clone)]
pub struct SubscriptionBusConfig {
    pub max_subscriptions_per_user: usize,
    pub max_subscriptions_per_channel: usize,
    pub subscription_timeout: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ContainerManagerConfig {
    pub default_memory_bytes: u64,
    pub default_cpu_millis: u64,
    pub status_poll_interval: Duration,
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct HealingConfig {
    pub max_attempts: u32,
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub log_level: String,
    pub log_format: LogFormat,
    pub concurrency: usize,
    pub token_bucket: TokenBucketConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub flow: FlowControllerConfig,
    pub subscriptions: SubscriptionBusConfig,
    pub containers: ContainerManagerConfig,
    pub healing: HealingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let loader = EnvLoader::with_prefix("AUTOQA_")
            .default("node_env", "development")
            .default("log_level", "info")
            .default("log_format", "human")
            .default("concurrency", "8")
            .default("tokens_per_minute", "60000")
            .default("requests_per_minute", "500")
            .default("failure_threshold", "5")
            .default("reset_timeout_ms", "30000")
            .default("monitoring_period_ms", "60000")
            .default("max_buffer_size", "10000")
            .default("max_memory_usage", "104857600") // 100 MiB
            .default("high_water_mark_pct", "0.8")
            .default("low_water_mark_pct", "0.5")
            .default("processing_rate", "1000")
            .default("slow_consumer_threshold_ms", "5000")
            .default("max_subscriptions_per_user", "50")
            .default("max_subscriptions_per_channel", "1000")
            .default("subscription_timeout_secs", "300")
            .default("sweep_interval_secs", "30")
            .default("container_memory_bytes", "2147483648") // 2 GiB
            .default("container_cpu_millis", "1000")
            .default("container_status_poll_ms", "2000")
            .default("container_namespace", "autoqa")
            .default("healing_max_attempts", "3")
            .default("healing_confidence_threshold", "0.8");

        let environment = match loader.get("node_env")?.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        };
        let log_format = match loader.get("log_format")?.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Human,
        };

        Ok(Self {
            environment,
            log_level: loader.get("log_level")?,
            log_format,
            concurrency: loader.get_u64("concurrency")? as usize,
            token_bucket: TokenBucketConfig {
                tokens_per_minute: loader.get_u64("tokens_per_minute")?,
                requests_per_minute: loader.get_u64("requests_per_minute")?,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: loader.get_u32("failure_threshold")?,
                reset_timeout: loader.get_duration_ms("reset_timeout_ms")?,
                monitoring_period: loader.get_duration_ms("monitoring_period_ms")?,
            },
            flow: FlowControllerConfig {
                max_buffer_size: loader.get_u64("max_buffer_size")? as usize,
                max_memory_usage: loader.get_u64("max_memory_usage")?,
                high_water_mark_pct: loader.get_f64("high_water_mark_pct")?,
                low_water_mark_pct: loader.get_f64("low_water_mark_pct")?,
                processing_rate: loader.get_u64("processing_rate")?,
                slow_consumer_threshold: loader.get_duration_ms("slow_consumer_threshold_ms")?,
            },
            subscriptions: SubscriptionBusConfig {
                max_subscriptions_per_user: loader.get_u64("max_subscriptions_per_user")? as usize,
                max_subscriptions_per_channel: loader.get_u64("max_subscriptions_per_channel")?
                    as usize,
                subscription_timeout: loader.get_duration_secs("subscription_timeout_secs")?,
                sweep_interval: loader.get_duration_secs("sweep_interval_secs")?,
            },
            containers: ContainerManagerConfig {
                default_memory_bytes: loader.get_u64("container_memory_bytes")?,
                default_cpu_millis: loader.get_u64("container_cpu_millis")?,
                status_poll_interval: loader.get_duration_ms("container_status_poll_ms")?,
                namespace: loader.get("container_namespace")?,
            },
            healing: HealingConfig {
                max_attempts: loader.get_u32("healing_max_attempts")?,
                confidence_threshold: loader.get_f64("healing_confidence_threshold")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_env_vars_set() {
        let config = AppConfig::from_env().expect("defaults alone should be sufficient");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.token_bucket.requests_per_minute, 500);
        assert_eq!(config.healing.max_attempts, 3);
    }

    #[test]
    fn explicit_env_var_overrides_default() {
        std::env::set_var("AUTOQA_NODE_ENV", "production");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.environment, Environment::Production);
        std::env::remove_var("AUTOQA_NODE_ENV");
    }
}
