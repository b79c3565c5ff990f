//! Execution requests, the canonical execution status machine, and metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chromium,
    Firefox,
    Webkit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        // spec.md §4.8: fallback viewport when unknown.
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub browser: BrowserKind,
    pub viewport: Viewport,
    pub headless: bool,
    pub timeout: std::time::Duration,
    pub retries: u32,
    pub parallel: bool,
    pub env: HashMap<String, String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chromium,
            viewport: Viewport::default(),
            headless: true,
            timeout: std::time::Duration::from_secs(300),
            retries: 0,
            parallel: false,
            env: HashMap::new(),
        }
    }
}

/// An inbound request before it has been admitted. `priority` is validated
/// to `0..=10` by `ExecutionRequest::new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub test_code: String,
    pub config: ExecutionConfig,
    pub owner: String,
    pub priority: u8,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestValidationError {
    #[error("priority {0} is out of range 0..=10")]
    PriorityOutOfRange(u8),
    #[error("test_code must not be empty")]
    EmptyTestCode,
}

impl ExecutionRequest {
    pub fn new(
        test_code: impl Into<String>,
        config: ExecutionConfig,
        owner: impl Into<String>,
        priority: u8,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Self, RequestValidationError> {
        let test_code = test_code.into();
        if test_code.trim().is_empty() {
            return Err(RequestValidationError::EmptyTestCode);
        }
        if priority > 10 {
            return Err(RequestValidationError::PriorityOutOfRange(priority));
        }
        Ok(Self {
            test_code,
            config,
            owner: owner.into(),
            priority,
            deadline,
        })
    }
}

/// Canonical execution status set (spec.md §3, Open Question 3). Other
/// subsystems' `passed/failed/skipped` vocabulary is a *display*
/// projection produced by `autoqa-report`, never stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::TimedOut
                | ExecutionStatus::Cancelled
        )
    }

    /// Status machine from spec.md §4.10: validates that `next` is a legal
    /// transition out of `self`. `Cancelled` is reachable from any
    /// non-terminal state.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Cancelled) => true,
            (Running, Completed) | (Running, Failed) | (Running, TimedOut) => true,
            (Running, Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub memory_peak_bytes: u64,
    pub cpu_seconds: f64,
    pub network_request_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub request: ExecutionRequest,
    pub status: ExecutionStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub container_id: Option<Uuid>,
    pub metrics: ExecutionMetrics,
    pub result_ref: Option<String>,
}

impl Execution {
    pub fn pending(id: Uuid, request: ExecutionRequest, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id,
            request,
            status: ExecutionStatus::Pending,
            enqueued_at,
            started_at: None,
            ended_at: None,
            container_id: None,
            metrics: ExecutionMetrics::default(),
            result_ref: None,
        }
    }

    /// Priority bucket derived from `request.priority` per spec.md §4.10:
    /// 0-3 → low, 4-7 → normal, 8-10 → high.
    pub fn priority_bucket(&self) -> crate::flow::Priority {
        crate::flow::Priority::from_numeric(self.request.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_priority() {
        let err = ExecutionRequest::new("code", ExecutionConfig::default(), "u1", 11, None)
            .unwrap_err();
        assert!(matches!(err, RequestValidationError::PriorityOutOfRange(11)));
    }

    #[test]
    fn rejects_empty_test_code() {
        let err =
            ExecutionRequest::new("   ", ExecutionConfig::default(), "u1", 5, None).unwrap_err();
        assert!(matches!(err, RequestValidationError::EmptyTestCode));
    }

    #[test]
    fn status_machine_allows_cancel_from_any_nonterminal() {
        assert!(ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Cancelled));
        assert!(ExecutionStatus::Running.can_transition_to(ExecutionStatus::Cancelled));
        assert!(!ExecutionStatus::Completed.can_transition_to(ExecutionStatus::Cancelled));
    }

    #[test]
    fn status_machine_rejects_illegal_transitions() {
        assert!(!ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Completed));
        assert!(!ExecutionStatus::Completed.can_transition_to(ExecutionStatus::Running));
    }
}
