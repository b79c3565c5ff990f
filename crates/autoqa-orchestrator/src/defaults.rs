//! Placeholder seam implementations a deployment replaces once it has a
//! real container backend and AI provider: `LocalProcessRuntime` resolves
//! pods immediately rather than going through a real orchestrator, the
//! same way `riptide-core`'s `Browser` trait is satisfied by
//! `spider_chrome` at the edge rather than inside the pool itself, and
//! `UnavailableProvider` keeps `ProviderPool::build` satisfiable before
//! any real `Provider` has been registered.

use async_trait::async_trait;
use autoqa_containers::{BrowserRuntime, RuntimeError};
use autoqa_intelligence::Provider as IntelligenceProvider;
use autoqa_intelligence::ProviderError;
use autoqa_types::{
    CollectedResult, ContainerHandle, ContainerMetrics, ContainerStatus, GenerationResult,
    PodSpec, ProviderRequest, ValidationResult,
};
use chrono::Utc;

/// Registered as both default and fallback when a deployment hasn't wired
/// a real `Provider` yet, so `ProviderPool::build` always has something to
/// point at. Every call fails fatally (never falls back to itself).
pub struct UnavailableProvider;

#[async_trait]
impl IntelligenceProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn generate(&self, _request: &ProviderRequest) -> Result<GenerationResult, ProviderError> {
        Err(ProviderError::Fatal("no AI provider configured".to_string()))
    }

    async fn validate(&self, _code: &str) -> Result<ValidationResult, ProviderError> {
        Err(ProviderError::Fatal("no AI provider configured".to_string()))
    }
}

pub struct LocalProcessRuntime;

#[async_trait]
impl BrowserRuntime for LocalProcessRuntime {
    async fn create_pod(&self, spec: PodSpec) -> Result<ContainerHandle, RuntimeError> {
        Ok(ContainerHandle {
            container_id: uuid::Uuid::nil(),
            pod_name: spec.pod_name,
            namespace: spec.namespace,
            caps: spec.caps,
            created_at: Utc::now(),
        })
    }

    async fn status(
        &self,
        _handle: &ContainerHandle,
    ) -> Result<(ContainerStatus, ContainerMetrics), RuntimeError> {
        Ok((ContainerStatus::Running, ContainerMetrics::default()))
    }

    async fn collect(&self, _handle: &ContainerHandle) -> Result<CollectedResult, RuntimeError> {
        Ok(CollectedResult {
            success: true,
            output: "no browser runtime configured; pod resolved as a no-op".to_string(),
            screenshots: Vec::new(),
            artifacts: Vec::new(),
            metrics: ContainerMetrics::default(),
        })
    }

    async fn destroy(&self, _handle: &ContainerHandle) -> Result<(), RuntimeError> {
        Ok(())
    }
}
