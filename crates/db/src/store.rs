//! Store abstraction consumed by the engine and the action executors.
//!
//! The engine never talks to a database directly; it is handed trait objects
//! at construction time.  [`crate::MemoryStore`] and [`crate::PgStore`]
//! implement every trait here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::DbError;
use crate::models::{
    ActionOutcome, EntityType, ExecutionStatus, NewIncident, NewNotification, NewTask, Workflow,
    WorkflowExecution,
};

/// Read access to workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Fetch a workflow (with its actions) regardless of its status.
    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>, DbError>;

    /// Workflows of `scope_id` that are active and have an `event` or `manual` trigger.
    async fn list_triggerable(&self, scope_id: Uuid) -> Result<Vec<Workflow>, DbError>;
}

/// Write access to execution records.  Each record is written by exactly one run.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert_execution(&self, execution: &WorkflowExecution) -> Result<(), DbError>;

    /// Append one entry to the results ledger.
    async fn append_result(&self, execution_id: Uuid, outcome: &ActionOutcome) -> Result<(), DbError>;

    /// Write the terminal status.
    async fn finish_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    async fn get_execution(&self, execution_id: Uuid) -> Result<Option<WorkflowExecution>, DbError>;
}

/// Creation of the entities produced by `notify`, `create_task` and `create_incident`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create_notification(&self, notification: &NewNotification) -> Result<Uuid, DbError>;
    async fn create_task(&self, task: &NewTask) -> Result<Uuid, DbError>;
    async fn create_incident(&self, incident: &NewIncident) -> Result<Uuid, DbError>;
}

/// Partial updates on one entity type.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Merge `patch` into the record owned by `scope_id`.  Returns
    /// [`DbError::NotFound`] if it does not exist in that scope, and
    /// [`DbError::InvalidColumn`] for `id` / `scope_id` or malformed keys.
    async fn patch(
        &self,
        scope_id: Uuid,
        record_id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<(), DbError>;
}

/// Maps entity types to the repository that can patch them.
#[derive(Clone, Default)]
pub struct RecordRegistry {
    repositories: HashMap<EntityType, Arc<dyn RecordRepository>>,
}

impl RecordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, entity: EntityType, repository: Arc<dyn RecordRepository>) -> Self {
        self.repositories.insert(entity, repository);
        self
    }

    pub fn get(&self, entity: EntityType) -> Option<&Arc<dyn RecordRepository>> {
        self.repositories.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl std::fmt::Debug for RecordRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entities: Vec<&str> = self.repositories.keys().map(|e| e.as_str()).collect();
        entities.sort_unstable();
        f.debug_struct("RecordRegistry").field("entities", &entities).finish()
    }
}

/// Everything the engine needs from persistence, as one handle.
pub trait Store: WorkflowStore + ExecutionStore + EntityStore {}

impl<T: WorkflowStore + ExecutionStore + EntityStore> Store for T {}
