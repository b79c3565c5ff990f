pub mod defaults;
pub mod errors;
pub mod handlers;
pub mod state;
pub mod ws;

pub use errors::ApiError;
pub use state::{Orchestrator, QueueStats};

use autoqa_config::AppConfig;
use autoqa_containers::ContainerManager;
use autoqa_events::SubscriptionBus;
use autoqa_flow::FlowController;
use autoqa_healing::HealingEngine;
use autoqa_intelligence::{AdmissionGate, ProviderPool};
use autoqa_types::{system_clock, Clock};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the full router bound to a shared `Orchestrator`. Split out from
/// `main` so integration tests can exercise the HTTP surface with
/// `tower::ServiceExt` without a listening socket.
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/executions", post(handlers::submit))
        .route("/executions/:id", get(handlers::get_status))
        .route("/executions/:id/cancel", post(handlers::cancel))
        .route("/executions/:id/report", get(handlers::get_report))
        .route("/queue/stats", get(handlers::get_queue_stats))
        .route("/providers/status", get(handlers::get_provider_status))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

/// Assembles every component crate from `AppConfig` using the system
/// clock. Provider registration is left to the caller (`main.rs`), since
/// which concrete `Provider` implementations exist is a deployment
/// concern, not a wiring one.
pub fn build_orchestrator(config: AppConfig, providers: ProviderPool, healing: HealingEngine) -> Arc<Orchestrator> {
    let clock: Arc<dyn Clock> = system_clock();
    let flow = Arc::new(FlowController::new(config.flow.clone(), clock.clone()));
    let containers = Arc::new(ContainerManager::new(
        Arc::new(defaults::LocalProcessRuntime),
        config.containers.clone(),
    ));
    let bus = Arc::new(SubscriptionBus::new(config.subscriptions.clone(), clock.clone()));
    let providers = Arc::new(providers);
    let admission = Arc::new(AdmissionGate::new(autoqa_reliability::DualBucket::new(
        config.token_bucket.requests_per_minute,
        config.token_bucket.tokens_per_minute,
        clock.clone(),
    )));
    let healing = Arc::new(healing);
    let artifacts = Arc::new(autoqa_artifacts::ArtifactCapture::new(
        Arc::new(autoqa_artifacts::InMemoryBlobStore::new()),
        autoqa_artifacts::CaptureConfig::default(),
        clock.clone(),
    ));
    let report_renderer = Arc::new(autoqa_report::ReportRenderer::new());

    Arc::new(Orchestrator::new(
        config,
        clock,
        flow,
        containers,
        bus,
        providers,
        admission,
        healing,
        artifacts,
        report_renderer,
    ))
}
