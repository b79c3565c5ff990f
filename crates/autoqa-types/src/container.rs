//! Container handles and the isolation policy passed to `BrowserRuntime`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Egress policy the `BrowserRuntime` is asked to enforce (spec.md §4.6,
/// §9 Open Question 4: enforcement itself is external, the control plane
/// only constructs the policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressPolicy {
    pub deny_link_local: bool,
    pub deny_loopback: bool,
    pub deny_private_ranges: bool,
    pub allow_public_internet: bool,
}

impl Default for EgressPolicy {
    fn default() -> Self {
        Self {
            deny_link_local: true,
            deny_loopback: true,
            deny_private_ranges: true,
            allow_public_internet: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCaps {
    pub memory_bytes: u64,
    pub cpu_millis: u64,
    pub wall_clock_timeout: Duration,
}

impl Default for ResourceCaps {
    fn default() -> Self {
        Self {
            memory_bytes: 2 * 1024 * 1024 * 1024, // 2 GiB default per spec.md §4.6
            cpu_millis: 1000,
            wall_clock_timeout: Duration::from_secs(300),
        }
    }
}

/// Spec for requesting an isolated pod from `BrowserRuntime::create_pod`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSpec {
    pub pod_name: String,
    pub namespace: String,
    pub non_root: bool,
    pub read_only_root_fs: bool,
    pub writable_paths: Vec<String>,
    pub dropped_capabilities: Vec<String>,
    pub caps: ResourceCaps,
    pub egress: EgressPolicy,
}

impl PodSpec {
    pub fn isolated(pod_name: String, namespace: String, caps: ResourceCaps) -> Self {
        Self {
            pod_name,
            namespace,
            non_root: true,
            read_only_root_fs: true,
            writable_paths: vec![
                "/app/screenshots".to_string(),
                "/app/reports".to_string(),
            ],
            dropped_capabilities: vec!["ALL".to_string()],
            caps,
            egress: EgressPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub container_id: Uuid,
    pub pod_name: String,
    pub namespace: String,
    pub caps: ResourceCaps,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Provisioning,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub container_id: Option<Uuid>,
    pub memory_usage_bytes: u64,
    pub cpu_usage_percent: f32,
    pub network_requests: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedResult {
    pub success: bool,
    pub output: String,
    pub screenshots: Vec<String>,
    pub artifacts: Vec<String>,
    pub metrics: ContainerMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_pod_spec_matches_policy() {
        let spec = PodSpec::isolated(
            "autoqa-test-abcd1234".into(),
            "autoqa".into(),
            ResourceCaps::default(),
        );
        assert!(spec.non_root);
        assert!(spec.read_only_root_fs);
        assert_eq!(spec.writable_paths.len(), 2);
        assert!(spec.egress.deny_link_local);
        assert!(spec.egress.allow_public_internet);
    }
}
