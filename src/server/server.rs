use super::metrics::metrics_handler;
use crate::background_jobs::{JobInfo, JobOrchestrator, OrchestratorState};
use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub struct ServerState {
    pub orchestrator: Arc<JobOrchestrator>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub state: OrchestratorState,
    pub pending_messages: usize,
    pub jobs: Vec<JobInfo>,
}

async fn list_jobs(State(state): State<ServerState>) -> Json<JobsResponse> {
    Json(JobsResponse {
        state: state.orchestrator.state(),
        pending_messages: state.orchestrator.pending_messages(),
        jobs: state.orchestrator.jobs(),
    })
}

async fn get_job(State(state): State<ServerState>, Path(name): Path<String>) -> Response {
    match state.orchestrator.job(&name) {
        Some(job) => Json(job).into_response(),
        None => (StatusCode::NOT_FOUND, format!("Unknown job: {}", name)).into_response(),
    }
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/v1/jobs", get(list_jobs))
        .route("/v1/jobs/{name}", get(get_job))
        .with_state(state)
}

/// Serve the admin API until `shutdown` is cancelled.
pub async fn run_server(
    orchestrator: Arc<JobOrchestrator>,
    port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = make_app(ServerState { orchestrator });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Admin API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
