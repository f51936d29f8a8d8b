use axum::extract::{Path, State};
use axum::Json;
use db::models::WorkflowExecution;
use uuid::Uuid;

use crate::{ApiError, AppState};

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    match state.executions.get_execution(id).await? {
        Some(execution) => Ok(Json(execution)),
        None => Err(ApiError::NotFound(format!("execution {id} not found"))),
    }
}
