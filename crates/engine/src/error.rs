//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

use crate::recorder::RecorderError;

/// Errors surfaced to callers of the orchestrator.
///
/// Action failures never appear here: they are recorded in the execution
/// ledger and the run continues.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Targeted runs ------

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    /// The workflow exists but is inactive, paused or archived.
    #[error("workflow {0} is not active")]
    WorkflowInactive(Uuid),

    #[error("trigger conditions of workflow {0} are not met")]
    ConditionsNotMet(Uuid),

    // ------ Bookkeeping ------

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    /// Persistence error while loading workflow definitions.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
