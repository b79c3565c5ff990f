//! Binary entry point, sequenced like `riptide-api::main`: config loads
//! first so a bad environment fails fast before anything is bound, then
//! tracing, then the router. No CLI flags — every knob is an `AUTOQA_*`
//! environment variable, read once by `AppConfig::from_env`.

use autoqa_config::AppConfig;
use autoqa_intelligence::ProviderPool;
use autoqa_orchestrator::defaults::UnavailableProvider;
use autoqa_orchestrator::{build_orchestrator, build_router};
use autoqa_types::{system_clock, CancelToken};
use std::sync::Arc;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG_ERROR: u8 = 64;
const EXIT_RUNTIME_ERROR: u8 = 70;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    // No providers are registered by default: a deployment wires its real
    // `Provider` implementations (e.g. an OpenAI- or Anthropic-backed one)
    // before building the pool. Without one, AI-assisted test generation
    // and self-healing synthesis are unavailable but the rest of the
    // control plane (admission, dispatch, artifacts, reporting) runs.
    let providers = match ProviderPool::builder()
        .register(Arc::new(UnavailableProvider), config.circuit_breaker.clone())
        .default_provider("unavailable")
        .build()
    {
        Ok(pool) => pool,
        Err(err) => {
            error!(error = %err, "provider pool configuration error");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let healing = autoqa_healing::HealingEngine::new(
        "system",
        autoqa_healing::default_chain(),
        config.healing.clone(),
        system_clock(),
    );

    let orchestrator = build_orchestrator(config.clone(), providers, healing);
    let shutdown = CancelToken::new();

    let dispatcher = tokio::spawn(orchestrator.clone().run_dispatcher(shutdown.clone()));
    let poller = autoqa_containers::spawn_status_poller(
        orchestrator.containers.clone(),
        config.containers.status_poll_interval,
        shutdown.clone(),
    );
    let sweeper = autoqa_events::spawn_sweeper(orchestrator.bus.clone(), config.subscriptions.sweep_interval);

    let app = build_router(orchestrator.clone());
    let bind_addr = "0.0.0.0:8080";
    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, bind_addr, "failed to bind listener");
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };
    info!(bind_addr, "autoqa-orchestrator listening");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    shutdown.cancel();
    sweeper.abort();
    let _ = dispatcher.await;
    poller.abort();
    orchestrator.containers.cleanup_all().await;

    match serve_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server error");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
