//! The `Provider` seam (spec.md §6's "Consumed — Provider"), in the shape
//! of `riptide-intelligence`'s own provider trait: an async-trait consumed
//! through `Arc<dyn Provider>`, with a name used for both routing and
//! diagnostics.

use async_trait::async_trait;
use autoqa_types::{GenerationResult, ProviderRequest, ValidationResult};
use thiserror::Error;

/// A provider's own classification of why a call failed, distinct from
/// the pool-level `IntelligenceError` built around it.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("transient provider error: {0}")]
    Transient(String),
    #[error("fatal provider error: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &ProviderRequest) -> Result<GenerationResult, ProviderError>;
    async fn validate(&self, code: &str) -> Result<ValidationResult, ProviderError>;
}
