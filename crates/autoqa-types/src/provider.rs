//! Provider request/response shapes shared between `autoqa-intelligence`
//! and `autoqa-healing` (spec.md §3, §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.2,
            model: "default".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub prompt: String,
    pub options: ProviderOptions,
}

impl ProviderRequest {
    /// `ceil(promptLength / 4) + maxTokens`, per spec.md §4.1's admission
    /// estimate that the Orchestrator passes to `TokenBucket::consume_tokens`.
    pub fn estimated_tokens(&self) -> u64 {
        let prompt_tokens = (self.prompt.len() as u64 + 3) / 4;
        prompt_tokens + self.options.max_tokens as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub code: String,
    pub explanation: Option<String>,
    pub confidence: f64,
    pub tokens_used: u64,
    pub model_name: String,
    pub provider_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimated_tokens_matches_spec_formula() {
        let request = ProviderRequest {
            prompt: "a".repeat(10),
            options: ProviderOptions {
                max_tokens: 100,
                ..Default::default()
            },
        };
        // ceil(10/4) = 3, + 100 = 103
        assert_eq!(request.estimated_tokens(), 103);
    }
}
