//! Typed environment variable access, in the shape of `riptide-config`'s
//! env loader. Trimmed down to what the control plane actually needs:
//! scalar getters plus defaults and a prefix, no generic `ConfigValue`
//! bridge since nothing here round-trips through a builder.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("environment variable not found: {var}")]
    NotFound { var: String },
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

pub struct EnvLoader {
    prefix: String,
    defaults: HashMap<String, String>,
}

impl EnvLoader {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            defaults: HashMap::new(),
        }
    }

    pub fn default(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(var.into(), value.into());
        self
    }

    fn var_name(&self, var: &str) -> String {
        format!("{}{}", self.prefix, var.to_uppercase())
    }

    pub fn get(&self, var: &str) -> Result<String, EnvError> {
        let full = self.var_name(var);
        env::var(&full).or_else(|_| {
            self.defaults
                .get(var)
                .cloned()
                .ok_or(EnvError::NotFound { var: full.clone() })
        })
    }

    pub fn get_optional(&self, var: &str) -> Option<String> {
        env::var(self.var_name(var))
            .ok()
            .or_else(|| self.defaults.get(var).cloned())
    }

    pub fn get_u64(&self, var: &str) -> Result<u64, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::InvalidValue {
            var: self.var_name(var),
            reason: format!("not an unsigned integer: {e}"),
        })
    }

    pub fn get_u32(&self, var: &str) -> Result<u32, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::InvalidValue {
            var: self.var_name(var),
            reason: format!("not an unsigned integer: {e}"),
        })
    }

    pub fn get_f64(&self, var: &str) -> Result<f64, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::InvalidValue {
            var: self.var_name(var),
            reason: format!("not a float: {e}"),
        })
    }

    pub fn get_bool(&self, var: &str) -> Result<bool, EnvError> {
        let value = self.get(var)?;
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(EnvError::InvalidValue {
                var: self.var_name(var),
                reason: format!("not a boolean: {other}"),
            }),
        }
    }

    pub fn get_duration_ms(&self, var: &str) -> Result<Duration, EnvError> {
        self.get_u64(var).map(Duration::from_millis)
    }

    pub fn get_duration_secs(&self, var: &str) -> Result<Duration, EnvError> {
        self.get_u64(var).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_value_over_default() {
        env::set_var("ENVTEST_PORT", "9000");
        let loader = EnvLoader::with_prefix("ENVTEST_").default("port", "8080");
        assert_eq!(loader.get_u32("port").unwrap(), 9000);
        env::remove_var("ENVTEST_PORT");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let loader = EnvLoader::with_prefix("ENVTEST_MISSING_").default("port", "8080");
        assert_eq!(loader.get_u32("port").unwrap(), 8080);
    }

    #[test]
    fn rejects_unparseable_bool() {
        env::set_var("ENVTEST_FLAG", "maybe");
        let loader = EnvLoader::with_prefix("ENVTEST_");
        assert!(loader.get_bool("flag").is_err());
        env::remove_var("ENVTEST_FLAG");
    }
}
