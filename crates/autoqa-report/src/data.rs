//! `ReportData` is assembled once and rendered by every format, so
//! semantic identity across formats is structural rather than something
//! each renderer has to preserve by discipline (spec.md §4.9).

use autoqa_types::{Artifact, Execution, ExecutionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayStatus {
    Passed,
    Failed,
    Skipped,
}

impl From<ExecutionStatus> for DisplayStatus {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Completed => DisplayStatus::Passed,
            ExecutionStatus::Cancelled => DisplayStatus::Skipped,
            ExecutionStatus::Failed | ExecutionStatus::TimedOut => DisplayStatus::Failed,
            ExecutionStatus::Pending | ExecutionStatus::Running => DisplayStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub status: DisplayStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_version: String,
    pub generator_version: String,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            report_version: "1.0".to_string(),
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub execution_id: String,
    pub execution_summary: ExecutionSummary,
    pub timeline: Vec<TimelineEvent>,
    pub artifacts: Vec<Artifact>,
    pub metadata: ReportMetadata,
}

/// Builds `ReportData` from a finalized execution, its artifact set, and
/// any intermediate timeline events collected along the way (step starts,
/// healing events, and similar). A start and end event are always present,
/// per spec.md §4.9's "at minimum a start and an end event".
pub fn assemble(
    execution: &Execution,
    artifacts: Vec<Artifact>,
    mut intermediate_events: Vec<TimelineEvent>,
    total_steps: usize,
    completed_steps: usize,
) -> ReportData {
    let mut timeline = vec![TimelineEvent {
        timestamp: execution.enqueued_at,
        label: "execution-started".to_string(),
    }];
    intermediate_events.sort_by_key(|event| event.timestamp);
    timeline.append(&mut intermediate_events);

    let end = execution.ended_at;
    if let Some(end) = end {
        timeline.push(TimelineEvent {
            timestamp: end,
            label: "execution-ended".to_string(),
        });
    }

    let duration_ms = match (execution.started_at, end) {
        (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
        _ => None,
    };

    ReportData {
        execution_id: execution.id.to_string(),
        execution_summary: ExecutionSummary {
            start: execution.enqueued_at,
            end,
            duration_ms,
            total_steps,
            completed_steps,
            status: execution.status.into(),
        },
        timeline,
        artifacts,
        metadata: ReportMetadata::default(),
    }
}
