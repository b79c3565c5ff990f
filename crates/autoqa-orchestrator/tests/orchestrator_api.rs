//! End-to-end coverage of the HTTP surface, driven straight through the
//! axum `Router` with `tower::ServiceExt::oneshot` rather than a bound
//! socket, in the style of the `tests/api` integration suite: build the
//! real app, send real requests, assert on status codes and bodies.

use autoqa_healing::default_chain;
use autoqa_intelligence::ProviderPool;
use autoqa_orchestrator::defaults::UnavailableProvider;
use autoqa_orchestrator::{build_orchestrator, build_router};
use autoqa_types::system_clock;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> autoqa_config::AppConfig {
    autoqa_config::AppConfig::from_env().expect("defaults alone should be sufficient")
}

fn test_app() -> axum::Router {
    let config = test_config();
    let providers = ProviderPool::builder()
        .register(Arc::new(UnavailableProvider), config.circuit_breaker.clone())
        .default_provider("unavailable")
        .build()
        .unwrap();
    let healing = autoqa_healing::HealingEngine::new(
        "system",
        default_chain(),
        config.healing.clone(),
        system_clock(),
    );
    let orchestrator = build_orchestrator(config, providers, healing);
    build_router(orchestrator)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn submit_then_status_reports_pending_before_dispatch() {
    let app = test_app();

    let submit_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/executions")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "test_code": "assert(true)",
                        "owner": "alice",
                        "priority": 5
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(submit_response.status(), StatusCode::OK);
    let submitted = body_json(submit_response).await;
    let execution_id = submitted["execution_id"].as_str().unwrap();

    // `LocalProcessRuntime` resolves pods immediately but the dispatcher
    // only runs once `run_dispatcher` is spawned; this app is wired
    // without it, so the execution is expected to stay Pending here.
    let status_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/executions/{execution_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(status_response.status(), StatusCode::OK);
    let execution = body_json(status_response).await;
    assert_eq!(execution["status"], "Pending");
}

#[tokio::test]
async fn rejects_invalid_priority_with_validation_error() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/executions")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "test_code": "assert(true)",
                        "owner": "alice",
                        "priority": 99
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn unknown_execution_returns_not_found() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/executions/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_is_idempotent_on_a_pending_execution() {
    let app = test_app();

    let submit_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/executions")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"test_code": "assert(true)", "owner": "bob"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let submitted = body_json(submit_response).await;
    let execution_id = submitted["execution_id"].as_str().unwrap().to_string();

    let first_cancel = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/executions/{execution_id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(first_cancel).await["cancelled"], true);

    let second_cancel = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/executions/{execution_id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(second_cancel).await["cancelled"], false);
}

#[tokio::test]
async fn queue_stats_reflects_admitted_executions() {
    let app = test_app();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/executions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"test_code": "assert(true)", "owner": "carol"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let stats_response = app
        .oneshot(Request::builder().uri("/queue/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let stats = body_json(stats_response).await;
    assert_eq!(stats["waiting"], 3);
    assert_eq!(stats["active"], 0);
}

#[tokio::test]
async fn provider_status_reports_the_default_provider() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/providers/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body.get("unavailable").is_some());
}
