//! The `BrowserRuntime` seam (spec.md §6's "Consumed — Browser Runtime").
//! `ContainerManager` never touches a container orchestrator directly; it
//! drives this trait, the same way `riptide-pool` drives `Browser`
//! through `spider_chrome` without the pool itself knowing CDP.

use async_trait::async_trait;
use autoqa_types::{CollectedResult, ContainerHandle, ContainerMetrics, ContainerStatus, PodSpec};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("pod creation failed: {0}")]
    CreationFailed(String),
    #[error("runtime operation timed out")]
    Timeout,
    #[error("handle not recognized by runtime: {0}")]
    UnknownHandle(String),
    #[error("runtime transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait BrowserRuntime: Send + Sync {
    async fn create_pod(&self, spec: PodSpec) -> Result<ContainerHandle, RuntimeError>;
    async fn status(
        &self,
        handle: &ContainerHandle,
    ) -> Result<(ContainerStatus, ContainerMetrics), RuntimeError>;
    async fn collect(&self, handle: &ContainerHandle) -> Result<CollectedResult, RuntimeError>;
    async fn destroy(&self, handle: &ContainerHandle) -> Result<(), RuntimeError>;
}
