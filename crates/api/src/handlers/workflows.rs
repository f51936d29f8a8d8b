use axum::extract::{Path, State};
use axum::Json;
use engine::ExecutionSummary;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct RunWorkflowDto {
    /// Event payload for the run; defaults to `{}`.
    #[serde(default)]
    pub data: Option<Value>,
}

pub async fn run(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    payload: Option<Json<RunWorkflowDto>>,
) -> Result<Json<ExecutionSummary>, ApiError> {
    let data = payload
        .and_then(|Json(dto)| dto.data)
        .unwrap_or_else(|| Value::Object(Default::default()));
    let summary = state.orchestrator.run_workflow(id, data).await?;
    Ok(Json(summary))
}
