//! Postgres-backed store.
//!
//! Every function takes a `&PgPool` and returns a `Result<T, DbError>`;
//! [`PgStore`] wires them into the store traits.

pub mod workflows;
pub mod executions;
pub mod entities;
pub mod records;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    DbError, DbPool,
    models::{
        ActionOutcome, EntityType, ExecutionStatus, NewIncident, NewNotification, NewTask,
        Workflow, WorkflowExecution,
    },
    store::{EntityStore, ExecutionStore, RecordRegistry, WorkflowStore},
};

pub use records::PgRecordRepository;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// A registry with one table-backed repository per [`EntityType`].
    pub fn record_registry(&self) -> RecordRegistry {
        EntityType::ALL.into_iter().fold(RecordRegistry::new(), |registry, entity| {
            registry.register(entity, Arc::new(PgRecordRepository::new(self.pool.clone(), entity)))
        })
    }
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>, DbError> {
        workflows::get_workflow(&self.pool, id).await
    }

    async fn list_triggerable(&self, scope_id: Uuid) -> Result<Vec<Workflow>, DbError> {
        workflows::list_triggerable(&self.pool, scope_id).await
    }
}

#[async_trait]
impl ExecutionStore for PgStore {
    async fn insert_execution(&self, execution: &WorkflowExecution) -> Result<(), DbError> {
        executions::insert_execution(&self.pool, execution).await
    }

    async fn append_result(&self, execution_id: Uuid, outcome: &ActionOutcome) -> Result<(), DbError> {
        executions::append_result(&self.pool, execution_id, outcome).await
    }

    async fn finish_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        executions::finish_execution(&self.pool, execution_id, status, error, finished_at).await
    }

    async fn get_execution(&self, execution_id: Uuid) -> Result<Option<WorkflowExecution>, DbError> {
        executions::get_execution(&self.pool, execution_id).await
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn create_notification(&self, notification: &NewNotification) -> Result<Uuid, DbError> {
        entities::create_notification(&self.pool, notification).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Uuid, DbError> {
        entities::create_task(&self.pool, task).await
    }

    async fn create_incident(&self, incident: &NewIncident) -> Result<Uuid, DbError> {
        entities::create_incident(&self.pool, incident).await
    }
}
