//! In-process store backed by hash maps.
//!
//! Used by the test-suites of every crate and by embedders that do not need
//! durability.  Cloning a `MemoryStore` yields another handle to the same data.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::DbError;
use crate::models::{
    ActionOutcome, EntityType, ExecutionStatus, NewIncident, NewNotification, NewTask, TriggerType,
    Workflow, WorkflowExecution,
};
use crate::store::{
    EntityStore, ExecutionStore, RecordRegistry, RecordRepository, WorkflowStore,
};

const UNLIMITED: usize = usize::MAX;

#[derive(Default)]
struct Inner {
    workflows: HashMap<Uuid, Workflow>,
    executions: HashMap<Uuid, WorkflowExecution>,
    notifications: Vec<(Uuid, NewNotification)>,
    tasks: Vec<(Uuid, NewTask)>,
    incidents: Vec<(Uuid, NewIncident)>,
    records: HashMap<(EntityType, Uuid), StoredRecord>,
    refuse_starts: HashSet<Uuid>,
    refuse_finishes: HashSet<Uuid>,
}

struct StoredRecord {
    scope_id: Uuid,
    fields: Map<String, Value>,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    /// Remaining `append_result` calls before the store starts refusing them.
    append_budget: Arc<AtomicUsize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            append_budget: Arc::new(AtomicUsize::new(UNLIMITED)),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a workflow definition.
    pub async fn insert_workflow(&self, workflow: Workflow) {
        self.inner.write().await.workflows.insert(workflow.id, workflow);
    }

    /// Seed a record owned by `scope_id` that `update_record` actions may patch.
    pub async fn insert_record(
        &self,
        entity: EntityType,
        scope_id: Uuid,
        id: Uuid,
        fields: Map<String, Value>,
    ) {
        self.inner
            .write()
            .await
            .records
            .insert((entity, id), StoredRecord { scope_id, fields });
    }

    pub async fn record(&self, entity: EntityType, id: Uuid) -> Option<Map<String, Value>> {
        self.inner
            .read()
            .await
            .records
            .get(&(entity, id))
            .map(|r| r.fields.clone())
    }

    pub async fn notifications(&self) -> Vec<(Uuid, NewNotification)> {
        self.inner.read().await.notifications.clone()
    }

    pub async fn tasks(&self) -> Vec<(Uuid, NewTask)> {
        self.inner.read().await.tasks.clone()
    }

    pub async fn incidents(&self) -> Vec<(Uuid, NewIncident)> {
        self.inner.read().await.incidents.clone()
    }

    /// All execution records of a workflow, oldest first.
    pub async fn executions_for(&self, workflow_id: Uuid) -> Vec<WorkflowExecution> {
        let inner = self.inner.read().await;
        let mut executions: Vec<WorkflowExecution> = inner
            .executions
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by_key(|e| e.started_at);
        executions
    }

    pub async fn execution_count(&self) -> usize {
        self.inner.read().await.executions.len()
    }

    /// Accept `n` more `append_result` calls, then fail every later one with
    /// [`DbError::Unavailable`].
    pub fn fail_appends_after(&self, n: usize) {
        self.append_budget.store(n, Ordering::SeqCst);
    }

    /// Refuse to create execution records for `workflow_id`.
    pub async fn fail_starts_for(&self, workflow_id: Uuid) {
        self.inner.write().await.refuse_starts.insert(workflow_id);
    }

    /// Refuse to finish execution records of `workflow_id`.
    pub async fn fail_finishes_for(&self, workflow_id: Uuid) {
        self.inner.write().await.refuse_finishes.insert(workflow_id);
    }

    /// A registry with one in-memory repository per [`EntityType`].
    pub fn record_registry(&self) -> RecordRegistry {
        EntityType::ALL.into_iter().fold(RecordRegistry::new(), |registry, entity| {
            registry.register(
                entity,
                Arc::new(MemoryRecordRepository {
                    entity,
                    inner: Arc::clone(&self.inner),
                }),
            )
        })
    }

    fn take_append_budget(&self) -> bool {
        self.append_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                UNLIMITED => Some(UNLIMITED),
                n => Some(n - 1),
            })
            .is_ok()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>, DbError> {
        Ok(self.inner.read().await.workflows.get(&id).cloned())
    }

    async fn list_triggerable(&self, scope_id: Uuid) -> Result<Vec<Workflow>, DbError> {
        let inner = self.inner.read().await;
        let mut workflows: Vec<Workflow> = inner
            .workflows
            .values()
            .filter(|w| w.scope_id == scope_id && w.is_eligible())
            .filter(|w| {
                matches!(
                    w.trigger.trigger_type(),
                    TriggerType::Event | TriggerType::Manual
                )
            })
            .cloned()
            .collect();
        workflows.sort_by_key(|w| w.created_at);
        Ok(workflows)
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn insert_execution(&self, execution: &WorkflowExecution) -> Result<(), DbError> {
        let mut inner = self.inner.write().await;
        if inner.refuse_starts.contains(&execution.workflow_id) {
            return Err(DbError::Unavailable("insert_execution refused".into()));
        }
        inner.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn append_result(&self, execution_id: Uuid, outcome: &ActionOutcome) -> Result<(), DbError> {
        if !self.take_append_budget() {
            return Err(DbError::Unavailable("append_result refused".into()));
        }
        let mut inner = self.inner.write().await;
        let execution = inner
            .executions
            .get_mut(&execution_id)
            .filter(|e| !e.status.is_terminal())
            .ok_or(DbError::NotFound)?;
        execution.results.push(outcome.clone());
        Ok(())
    }

    async fn finish_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.write().await;
        let workflow_id = inner
            .executions
            .get(&execution_id)
            .filter(|e| !e.status.is_terminal())
            .map(|e| e.workflow_id)
            .ok_or(DbError::NotFound)?;
        if inner.refuse_finishes.contains(&workflow_id) {
            return Err(DbError::Unavailable("finish_execution refused".into()));
        }
        let execution = inner
            .executions
            .get_mut(&execution_id)
            .ok_or(DbError::NotFound)?;
        execution.status = status;
        execution.error = error.map(str::to_owned);
        execution.finished_at = Some(finished_at);
        Ok(())
    }

    async fn get_execution(&self, execution_id: Uuid) -> Result<Option<WorkflowExecution>, DbError> {
        Ok(self.inner.read().await.executions.get(&execution_id).cloned())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_notification(&self, notification: &NewNotification) -> Result<Uuid, DbError> {
        let id = Uuid::new_v4();
        self.inner
            .write()
            .await
            .notifications
            .push((id, notification.clone()));
        Ok(id)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Uuid, DbError> {
        let id = Uuid::new_v4();
        self.inner.write().await.tasks.push((id, task.clone()));
        Ok(id)
    }

    async fn create_incident(&self, incident: &NewIncident) -> Result<Uuid, DbError> {
        let id = Uuid::new_v4();
        self.inner.write().await.incidents.push((id, incident.clone()));
        Ok(id)
    }
}

struct MemoryRecordRepository {
    entity: EntityType,
    inner: Arc<RwLock<Inner>>,
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn patch(
        &self,
        scope_id: Uuid,
        record_id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<(), DbError> {
        if let Some(key) = patch.keys().find(|k| *k == "id" || *k == "scope_id") {
            return Err(DbError::InvalidColumn(key.clone()));
        }
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(&(self.entity, record_id))
            .filter(|r| r.scope_id == scope_id)
            .ok_or(DbError::NotFound)?;
        for (key, value) in patch {
            record.fields.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
