//! The `ActionExecutor` trait: the contract every action kind fulfils.

use async_trait::async_trait;
use db::models::ActionType;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::ActionError;

/// Shared context passed to every executor of a run.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Tenant/company that owns the workflow.
    pub scope_id: Uuid,
    pub workflow_id: Uuid,
    pub execution_id: Uuid,
    /// Type of the event that triggered the run (`"manual"` for targeted runs).
    pub event_type: String,
    /// Event payload.  Every action of a run sees the same data.
    pub data: Value,
}

impl ActionContext {
    /// Read-only view handed to external evaluators.
    pub fn snapshot(&self) -> Value {
        json!({
            "event": self.data,
            "context": {
                "scopeId": self.scope_id,
                "workflowId": self.workflow_id,
                "executionId": self.execution_id,
                "eventType": self.event_type,
            }
        })
    }
}

/// One executor per action kind.
///
/// The config has already been rendered and parsed into the executor's own
/// typed shape, so implementations only deal with downstream failures.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Typed configuration this executor consumes.
    type Config: Send;

    const ACTION_TYPE: ActionType;

    /// Perform the side effect and return the result payload recorded in the ledger.
    async fn execute(&self, config: Self::Config, ctx: &ActionContext) -> Result<Value, ActionError>;
}
