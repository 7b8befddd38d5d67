// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use stiv_dashboard::application::dashboard_session::DashboardSession;
use stiv_dashboard::infrastructure::config::load_dashboard_config;
use stiv_dashboard::infrastructure::file_storage::InMemoryFileStorage;
use stiv_dashboard::infrastructure::mock_engine::MockAnalysisEngine;
use stiv_dashboard::infrastructure::simulated_backend::SimulatedJobBackend;
use stiv_dashboard::presentation::app_state::AppState;
use stiv_dashboard::presentation::handlers::{
    get_analysis, get_playback, get_processes, get_tabs, get_upload, health_check, retry_stage,
    select_file, select_tab, start_playback, start_processing, stop_playback, stream_processes,
    toggle_playback, update_parameters,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_dashboard_config()?;

    // Create adapters (infrastructure layer)
    let mut backend = SimulatedJobBackend::new(config.backend.tick(), config.backend.step);
    if let Some(stage_id) = config.backend.fail_stage_once {
        tracing::warn!("Simulated backend will fail stage {} once", stage_id);
        backend = backend.with_failure_once(stage_id);
    }
    let engine = Arc::new(MockAnalysisEngine);
    let storage = Arc::new(InMemoryFileStorage::default());

    // Open the session (application layer)
    let session = DashboardSession::open(&config, engine, Arc::new(backend), storage).await?;
    let state = Arc::new(AppState {
        session: session.clone(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/tabs", get(get_tabs))
        .route("/tabs/:tab", put(select_tab))
        .route("/playback", get(get_playback))
        .route("/playback/start", post(start_playback))
        .route("/playback/stop", post(stop_playback))
        .route("/playback/toggle", post(toggle_playback))
        .route("/analysis", get(get_analysis))
        .route("/analysis/parameters", put(update_parameters))
        .route("/uploads/current", get(get_upload))
        .route("/uploads", post(select_file))
        .route("/processes", get(get_processes))
        .route("/processes/start", post(start_processing))
        .route("/processes/:id/retry", post(retry_stage))
        .route("/processes/stream", get(stream_processes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.addr.parse()?;
    tracing::info!("Starting stiv-dashboard on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    session.shutdown().await;
    Ok(())
}
