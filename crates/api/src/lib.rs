//! `api` crate — HTTP surface of the workflow engine.
//!
//! Exposes:
//!   POST   /api/v1/events
//!   POST   /api/v1/workflows/{id}/run
//!   GET    /api/v1/executions/{id}
//!   GET    /health

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use db::ExecutionStore;
use engine::WorkflowOrchestrator;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
pub mod handlers;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: WorkflowOrchestrator,
    pub executions: Arc<dyn ExecutionStore>,
}

impl AppState {
    pub fn new(orchestrator: WorkflowOrchestrator, executions: Arc<dyn ExecutionStore>) -> Self {
        Self { orchestrator, executions }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/events", post(handlers::events::dispatch))
        .route("/api/v1/workflows/:id/run", post(handlers::workflows::run))
        .route("/api/v1/executions/:id", get(handlers::executions::get))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
