//! Inputs and outputs of the orchestrator.

use db::models::{ActionOutcome, ExecutionStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Event type used for targeted runs.
pub const MANUAL_EVENT_TYPE: &str = "manual";

/// A business event handed to [`crate::WorkflowOrchestrator::dispatch_event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub scope_id: Uuid,
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl TriggerEvent {
    pub fn new(scope_id: Uuid, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            scope_id,
            event_type: event_type.into(),
            data,
        }
    }
}

/// What one run of one workflow produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub results: Vec<ActionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionSummary {
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// A matched workflow whose run could not be carried out or recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowError {
    pub workflow_id: Uuid,
    pub message: String,
}

/// Aggregate result of a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    /// Workflows whose run was started.
    pub executed_count: usize,
    /// Runs that finished with status `success`.
    pub succeeded_count: usize,
    pub results: Vec<ExecutionSummary>,
    pub workflow_errors: Vec<WorkflowError>,
}
