//! Container registry and lifecycle (spec.md §4.6), in the shape of
//! `riptide-pool`'s `BrowserPoolConfig`/`PooledBrowser`: a registry keyed
//! by id, a cached health/status snapshot refreshed by a background
//! poller, and idempotent teardown.

use crate::runtime::{BrowserRuntime, RuntimeError};
use autoqa_config::ContainerManagerConfig;
use autoqa_types::{
    new_container_id, new_pod_name, CancelToken, CollectedResult, ContainerHandle,
    ContainerMetrics, ContainerStatus, PodSpec, ResourceCaps,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(Uuid),
    #[error("cancelled before pod creation completed")]
    Cancelled,
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

struct Registered {
    handle: ContainerHandle,
    status: ContainerStatus,
    metrics: ContainerMetrics,
}

pub struct ContainerManager {
    runtime: Arc<dyn BrowserRuntime>,
    registry: Mutex<HashMap<Uuid, Registered>>,
    config: ContainerManagerConfig,
}

impl ContainerManager {
    pub fn new(runtime: Arc<dyn BrowserRuntime>, config: ContainerManagerConfig) -> Self {
        Self {
            runtime,
            registry: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Allocates a fresh container identity, requests an isolated pod, and
    /// registers the resulting handle. ContainerIds and PodNames are never
    /// reused (spec.md §3 invariant 2).
    pub async fn execute_test(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ContainerHandle, ContainerError> {
        let container_id = new_container_id();
        let pod_name = new_pod_name();
        let caps = ResourceCaps {
            memory_bytes: self.config.default_memory_bytes,
            cpu_millis: self.config.default_cpu_millis,
            wall_clock_timeout: timeout,
        };
        let spec = PodSpec::isolated(pod_name, self.config.namespace.clone(), caps);

        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ContainerError::Cancelled),
            result = self.runtime.create_pod(spec) => result?,
        };
        let handle = ContainerHandle {
            container_id,
            ..created
        };

        self.registry.lock().expect("container registry poisoned").insert(
            container_id,
            Registered {
                handle: handle.clone(),
                status: ContainerStatus::Provisioning,
                metrics: ContainerMetrics {
                    container_id: Some(container_id),
                    ..ContainerMetrics::default()
                },
            },
        );

        info!(%container_id, "pod provisioned");
        Ok(handle)
    }

    fn handle_of(&self, container_id: Uuid) -> Result<ContainerHandle, ContainerError> {
        self.registry
            .lock()
            .expect("container registry poisoned")
            .get(&container_id)
            .map(|r| r.handle.clone())
            .ok_or(ContainerError::NotFound(container_id))
    }

    pub async fn get_status(
        &self,
        container_id: Uuid,
    ) -> Result<(ContainerStatus, ContainerMetrics), ContainerError> {
        // Cached snapshot if the poller has already run, otherwise a live
        // fetch; either way external callers only ever see a snapshot,
        // never the live registry (spec.md §5 shared-resource policy).
        let cached = {
            let registry = self.registry.lock().expect("container registry poisoned");
            registry
                .get(&container_id)
                .map(|r| (r.status, r.metrics.clone()))
        };
        match cached {
            Some(snapshot) => Ok(snapshot),
            None => Err(ContainerError::NotFound(container_id)),
        }
    }

    pub async fn collect_results(
        &self,
        container_id: Uuid,
    ) -> Result<CollectedResult, ContainerError> {
        let handle = self.handle_of(container_id)?;
        Ok(self.runtime.collect(&handle).await?)
    }

    /// Idempotent on `container_id`: the first caller to observe the entry
    /// runs teardown, everyone else (including a second concurrent call)
    /// is a no-op. Satisfies "cleanup path executed exactly once" even
    /// when racing another cleanup.
    pub async fn cleanup(&self, container_id: Uuid) {
        let removed = self
            .registry
            .lock()
            .expect("container registry poisoned")
            .remove(&container_id);
        if let Some(entry) = removed {
            if let Err(err) = self.runtime.destroy(&entry.handle).await {
                error!(%container_id, error = %err, "pod teardown failed");
            }
        }
    }

    pub async fn cleanup_all(&self) {
        let handles: Vec<ContainerHandle> = {
            let mut registry = self.registry.lock().expect("container registry poisoned");
            registry.drain().map(|(_, entry)| entry.handle).collect()
        };
        for handle in handles {
            if let Err(err) = self.runtime.destroy(&handle).await {
                error!(container_id = %handle.container_id, error = %err, "pod teardown failed during shutdown");
            }
        }
    }

    /// Refreshes the cached status/metrics for every registered container.
    /// Called by the background poller; exposed directly so tests don't
    /// need to wait on a spawned interval.
    pub async fn poll_once(&self) {
        let container_ids: Vec<Uuid> = self
            .registry
            .lock()
            .expect("container registry poisoned")
            .keys()
            .copied()
            .collect();

        for container_id in container_ids {
            let handle = match self.handle_of(container_id) {
                Ok(h) => h,
                Err(_) => continue,
            };
            match self.runtime.status(&handle).await {
                Ok((status, metrics)) => {
                    let mut registry = self.registry.lock().expect("container registry poisoned");
                    if let Some(entry) = registry.get_mut(&container_id) {
                        entry.status = status;
                        entry.metrics = metrics;
                    }
                }
                Err(err) => {
                    warn!(%container_id, error = %err, "status poll failed");
                }
            }
        }
    }

    pub fn registered_count(&self) -> usize {
        self.registry.lock().expect("container registry poisoned").len()
    }
}

pub fn spawn_status_poller(
    manager: Arc<ContainerManager>,
    interval: Duration,
    cancel: CancelToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => manager.poll_once().await,
            }
        }
    })
}
