//! REST surface: submit/cancel/status/queue-stats/provider-status. Thin
//! functions in the shape of `riptide-api`'s handler modules: deserialize,
//! call into `Orchestrator`, let `ApiError`'s `IntoResponse` impl handle
//! the failure path.

use crate::errors::ApiError;
use crate::state::{Orchestrator, QueueStats};
use autoqa_report::ReportFormat;
use autoqa_types::{Execution, ExecutionConfig, ExecutionRequest};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub test_code: String,
    #[serde(default)]
    pub config: ExecutionConfig,
    pub owner: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_priority() -> u8 {
    5
}

#[derive(Debug, serde::Serialize)]
pub struct SubmitResponse {
    pub execution_id: Uuid,
}

pub async fn submit(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let request = ExecutionRequest::new(
        body.test_code,
        body.config,
        body.owner,
        body.priority,
        body.deadline,
    )?;
    let execution_id = orchestrator.submit(request)?;
    Ok(Json(SubmitResponse { execution_id }))
}

pub async fn cancel(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let transitioned = orchestrator.cancel_execution(execution_id)?;
    Ok(Json(serde_json::json!({ "cancelled": transitioned })))
}

pub async fn get_status(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<Execution>, ApiError> {
    Ok(Json(orchestrator.get_status(execution_id)?))
}

pub async fn get_queue_stats(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Json<QueueStats> {
    Json(orchestrator.get_queue_stats())
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

pub async fn get_report(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(execution_id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (format, content_type) = match query.format.as_deref() {
        Some("json") => (ReportFormat::Json, "application/json"),
        Some("pdf") => (ReportFormat::Pdf, "application/pdf"),
        _ => (ReportFormat::Html, "text/html"),
    };
    let bytes = orchestrator.get_report(execution_id, format)?;
    Ok(([(header::CONTENT_TYPE, content_type)], Bytes::from(bytes)))
}

pub async fn get_provider_status(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Json<serde_json::Value> {
    let status = orchestrator.get_provider_status();
    let rendered: std::collections::HashMap<String, serde_json::Value> = status
        .into_iter()
        .map(|(name, status)| {
            (
                name,
                serde_json::json!({
                    "available": status.available,
                    "circuitState": format!("{:?}", status.circuit_state),
                    "failureCount": status.failure_count,
                }),
            )
        })
        .collect();
    Json(serde_json::json!(rendered))
}
