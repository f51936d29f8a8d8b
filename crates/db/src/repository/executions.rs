//! Execution record queries.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::{
    DbError,
    models::{ActionOutcome, ExecutionStatus, WorkflowExecution},
};

#[derive(Debug, FromRow)]
struct ExecutionRow {
    id: Uuid,
    workflow_id: Uuid,
    status: String,
    trigger_data: Value,
    results: Value,
    error: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRow {
    fn into_execution(self) -> Result<WorkflowExecution, DbError> {
        let status = serde_json::from_value(Value::String(self.status))
            .map_err(|source| DbError::Corrupt { column: "status", source })?;
        let results = serde_json::from_value(self.results)
            .map_err(|source| DbError::Corrupt { column: "results", source })?;

        Ok(WorkflowExecution {
            id: self.id,
            workflow_id: self.workflow_id,
            status,
            trigger_data: self.trigger_data,
            results,
            error: self.error,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

/// Insert a new execution record (normally in `running` status).
pub async fn insert_execution(pool: &PgPool, execution: &WorkflowExecution) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflow_executions
            (id, workflow_id, status, trigger_data, results, error, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(execution.id)
    .bind(execution.workflow_id)
    .bind(execution.status.to_string())
    .bind(&execution.trigger_data)
    .bind(Json(&execution.results))
    .bind(&execution.error)
    .bind(execution.started_at)
    .bind(execution.finished_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Append one outcome to the `results` array of a running execution.
pub async fn append_result(
    pool: &PgPool,
    execution_id: Uuid,
    outcome: &ActionOutcome,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE workflow_executions
        SET results = results || jsonb_build_array($2::jsonb)
        WHERE id = $1 AND status = 'running'
        "#,
    )
    .bind(execution_id)
    .bind(Json(outcome))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Write the terminal status.  A finished execution is never updated again.
pub async fn finish_execution(
    pool: &PgPool,
    execution_id: Uuid,
    status: ExecutionStatus,
    error: Option<&str>,
    finished_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE workflow_executions
        SET status = $2, error = $3, finished_at = $4
        WHERE id = $1 AND status = 'running'
        "#,
    )
    .bind(execution_id)
    .bind(status.to_string())
    .bind(error)
    .bind(finished_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Fetch a single execution record.
pub async fn get_execution(
    pool: &PgPool,
    execution_id: Uuid,
) -> Result<Option<WorkflowExecution>, DbError> {
    let row = sqlx::query_as::<_, ExecutionRow>(
        r#"
        SELECT id, workflow_id, status, trigger_data, results, error, started_at, finished_at
        FROM workflow_executions
        WHERE id = $1
        "#,
    )
    .bind(execution_id)
    .fetch_optional(pool)
    .await?;

    row.map(ExecutionRow::into_execution).transpose()
}
