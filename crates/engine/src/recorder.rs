//! Execution recorder: the durable trail of a run.
//!
//! `start` writes a `running` record before any action executes, `append`
//! adds one ledger entry per action, `finish` writes the single terminal
//! status.

use std::sync::Arc;

use chrono::Utc;
use db::models::{ActionOutcome, ExecutionStatus, WorkflowExecution};
use db::{DbError, ExecutionStore};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// The store failed while bookkeeping a run.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to start execution for workflow {workflow_id}: {source}")]
    Start {
        workflow_id: Uuid,
        #[source]
        source: DbError,
    },

    #[error("failed to record result for execution {execution_id}: {source}")]
    Append {
        execution_id: Uuid,
        #[source]
        source: DbError,
    },

    #[error("failed to finish execution {execution_id}: {source}")]
    Finish {
        execution_id: Uuid,
        #[source]
        source: DbError,
    },
}

#[derive(Clone)]
pub struct ExecutionRecorder {
    store: Arc<dyn ExecutionStore>,
}

impl ExecutionRecorder {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self { store }
    }

    /// Create the `running` record and return its id.
    #[instrument(skip(self, trigger_data))]
    pub async fn start(&self, workflow_id: Uuid, trigger_data: &Value) -> Result<Uuid, RecorderError> {
        let execution = WorkflowExecution::start(workflow_id, trigger_data.clone());
        self.store
            .insert_execution(&execution)
            .await
            .map_err(|source| {
                error!(%workflow_id, "could not create execution record: {source}");
                RecorderError::Start { workflow_id, source }
            })?;
        debug!(execution_id = %execution.id, "execution started");
        Ok(execution.id)
    }

    #[instrument(skip(self, outcome), fields(action_id = %outcome.action_id, status = ?outcome.status))]
    pub async fn append(&self, execution_id: Uuid, outcome: &ActionOutcome) -> Result<(), RecorderError> {
        self.store
            .append_result(execution_id, outcome)
            .await
            .map_err(|source| {
                error!("could not append action result: {source}");
                RecorderError::Append { execution_id, source }
            })
    }

    #[instrument(skip(self))]
    pub async fn finish(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
    ) -> Result<(), RecorderError> {
        self.store
            .finish_execution(execution_id, status, error, Utc::now())
            .await
            .map_err(|source| {
                error!("could not finish execution: {source}");
                RecorderError::Finish { execution_id, source }
            })
    }
}
