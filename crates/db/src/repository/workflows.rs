//! Workflow definition queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::{
    DbError,
    models::{Workflow, WorkflowAction},
};

#[derive(Debug, FromRow)]
struct WorkflowRow {
    id: Uuid,
    scope_id: Uuid,
    name: String,
    trigger: Value,
    is_active: bool,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ActionRow {
    id: Uuid,
    workflow_id: Uuid,
    action_type: String,
    config: Value,
    conditions: Value,
    position: i32,
}

fn decode<T: serde::de::DeserializeOwned>(column: &'static str, value: Value) -> Result<T, DbError> {
    serde_json::from_value(value).map_err(|source| DbError::Corrupt { column, source })
}

impl ActionRow {
    fn into_action(self) -> Result<WorkflowAction, DbError> {
        Ok(WorkflowAction {
            id: self.id,
            workflow_id: self.workflow_id,
            action_type: decode("action_type", Value::String(self.action_type))?,
            config: self.config,
            conditions: decode("conditions", self.conditions)?,
            order: self.position,
        })
    }
}

impl WorkflowRow {
    /// Decode the workflow together with its own action rows.  A corrupt action
    /// makes the whole workflow undecodable, never its siblings.
    fn assemble(self, action_rows: Vec<ActionRow>) -> Result<Workflow, DbError> {
        let actions = action_rows
            .into_iter()
            .map(ActionRow::into_action)
            .collect::<Result<Vec<_>, _>>()?;
        self.into_workflow(actions)
    }

    fn into_workflow(self, actions: Vec<WorkflowAction>) -> Result<Workflow, DbError> {
        Ok(Workflow {
            id: self.id,
            scope_id: self.scope_id,
            name: self.name,
            trigger: decode("trigger", self.trigger)?,
            is_active: self.is_active,
            status: decode("status", Value::String(self.status))?,
            actions,
            created_at: self.created_at,
        })
    }
}

/// Fetch a single workflow and its actions by primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<Option<Workflow>, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, scope_id, name, trigger, is_active, status, created_at
        FROM workflows
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut actions = load_actions(pool, &[id]).await?;
    row.assemble(actions.remove(&id).unwrap_or_default()).map(Some)
}

/// Active workflows of a scope whose trigger is `event` or `manual`, oldest first.
///
/// Workflows whose stored definition cannot be decoded are logged and left out
/// so they cannot block the other workflows of the scope.
pub async fn list_triggerable(pool: &PgPool, scope_id: Uuid) -> Result<Vec<Workflow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, scope_id, name, trigger, is_active, status, created_at
        FROM workflows
        WHERE scope_id = $1
          AND is_active
          AND status = 'active'
          AND trigger->>'type' IN ('event', 'manual')
        ORDER BY created_at ASC
        "#,
    )
    .bind(scope_id)
    .fetch_all(pool)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut actions = load_actions(pool, &ids).await?;

    Ok(assemble_all(rows, &mut actions))
}

fn assemble_all(
    rows: Vec<WorkflowRow>,
    actions: &mut HashMap<Uuid, Vec<ActionRow>>,
) -> Vec<Workflow> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            let own = actions.remove(&id).unwrap_or_default();
            match row.assemble(own) {
                Ok(workflow) => Some(workflow),
                Err(e) => {
                    warn!(workflow_id = %id, error = %e, "skipping undecodable workflow");
                    None
                }
            }
        })
        .collect()
}

/// Raw action rows of the given workflows, grouped by workflow and sorted by position.
async fn load_actions(
    pool: &PgPool,
    workflow_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<ActionRow>>, DbError> {
    if workflow_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, ActionRow>(
        r#"
        SELECT id, workflow_id, action_type, config, conditions, position
        FROM workflow_actions
        WHERE workflow_id = ANY($1)
        ORDER BY workflow_id, position ASC
        "#,
    )
    .bind(workflow_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<ActionRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.workflow_id).or_default().push(row);
    }
    Ok(grouped)
}
