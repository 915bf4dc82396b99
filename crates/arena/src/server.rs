use std::sync::Arc;

use arena_agents::CycleOrchestrator;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::trigger::{trigger, TriggerError, TriggerRequest};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<CycleOrchestrator>,
    secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<CycleOrchestrator>, secret: Option<String>) -> Self {
        Self {
            orchestrator,
            secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }
}

/// `GET /api/cron?key=…&force=true` runs a cycle; `GET /health` is a liveness probe.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/cron", get(cron))
        .route("/health", get(health))
        .with_state(state)
}

async fn cron(State(state): State<AppState>, Query(request): Query<TriggerRequest>) -> Response {
    match trigger(&state.orchestrator, state.secret.as_deref(), &request).await {
        Ok(report) => Json(json!({
            "status": "Success",
            "mode": request.mode(),
            "cycle_id": report.id,
            "elapsed_ms": report.elapsed_ms,
            "results": report.results,
        }))
        .into_response(),
        Err(TriggerError::Unauthorized) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        )
            .into_response(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Serve until `cancel` fires.
pub async fn serve(state: AppState, bind: &str, cancel: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "Trigger server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("Trigger server stopped");
    Ok(())
}
