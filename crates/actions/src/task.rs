//! `create_task` and `create_incident`: records owned by the triggering scope.

use std::sync::Arc;

use async_trait::async_trait;
use db::EntityStore;
use db::models::{ActionType, NewIncident, NewTask};
use serde_json::{Value, json};
use tracing::info;

use crate::config::{IncidentConfig, TaskConfig};
use crate::traits::{ActionContext, ActionExecutor};
use crate::ActionError;

pub struct CreateTaskExecutor {
    store: Arc<dyn EntityStore>,
}

impl CreateTaskExecutor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionExecutor for CreateTaskExecutor {
    type Config = TaskConfig;
    const ACTION_TYPE: ActionType = ActionType::CreateTask;

    async fn execute(&self, config: TaskConfig, ctx: &ActionContext) -> Result<Value, ActionError> {
        let task = NewTask {
            scope_id: ctx.scope_id,
            title: config.title,
            description: config.description,
            assignee: config.assignee,
            priority: config.priority,
            due_date: config.due_date,
        };
        let id = self
            .store
            .create_task(&task)
            .await
            .map_err(|e| ActionError::execution(Self::ACTION_TYPE, e))?;

        info!(task_id = %id, "task created");
        Ok(json!({ "taskId": id }))
    }
}

pub struct CreateIncidentExecutor {
    store: Arc<dyn EntityStore>,
}

impl CreateIncidentExecutor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionExecutor for CreateIncidentExecutor {
    type Config = IncidentConfig;
    const ACTION_TYPE: ActionType = ActionType::CreateIncident;

    async fn execute(&self, config: IncidentConfig, ctx: &ActionContext) -> Result<Value, ActionError> {
        let incident = NewIncident {
            scope_id: ctx.scope_id,
            title: config.title,
            description: config.description,
            priority: config.priority,
            building_id: config.building_id,
            unit_id: config.unit_id,
        };
        let id = self
            .store
            .create_incident(&incident)
            .await
            .map_err(|e| ActionError::execution(Self::ACTION_TYPE, e))?;

        info!(incident_id = %id, "incident created");
        Ok(json!({ "incidentId": id }))
    }
}
