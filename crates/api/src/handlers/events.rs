use axum::extract::State;
use axum::Json;
use engine::{DispatchReport, TriggerEvent};

use crate::{ApiError, AppState};

pub async fn dispatch(
    State(state): State<AppState>,
    Json(event): Json<TriggerEvent>,
) -> Result<Json<DispatchReport>, ApiError> {
    let report = state.orchestrator.dispatch_event(event).await?;
    Ok(Json(report))
}
