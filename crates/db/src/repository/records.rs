//! Generic partial updates for `update_record`.
//!
//! Column names come from user-authored workflow configs, so every key is
//! checked against a strict identifier pattern before it reaches SQL.  Values
//! are never interpolated: the whole patch is bound as one JSONB parameter and
//! converted to the table's column types by `jsonb_populate_record`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::EntityType, store::RecordRepository};

/// Columns a patch may never touch.
const PROTECTED_COLUMNS: [&str; 2] = ["id", "scope_id"];

/// Lowercase snake_case identifiers only, as produced by the schema.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Build the UPDATE statement for the given columns.
fn patch_statement(table: &str, columns: &[&str]) -> String {
    let quoted = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {table} SET ({quoted}) = (SELECT {quoted} FROM jsonb_populate_record(NULL::{table}, $1)) WHERE id = $2 AND scope_id = $3"
    )
}

/// Patch a record owned by `scope_id`.  Records of other scopes are reported
/// as [`DbError::NotFound`].
pub async fn patch_record(
    pool: &PgPool,
    entity: EntityType,
    scope_id: Uuid,
    record_id: Uuid,
    patch: &Map<String, Value>,
) -> Result<(), DbError> {
    let table = entity.table_name();

    let mut columns = Vec::with_capacity(patch.len());
    for key in patch.keys() {
        if !is_identifier(key) || PROTECTED_COLUMNS.contains(&key.as_str()) {
            return Err(DbError::InvalidColumn(key.clone()));
        }
        columns.push(key.as_str());
    }

    let rows_affected = if columns.is_empty() {
        sqlx::query(&format!("SELECT 1 FROM {table} WHERE id = $1 AND scope_id = $2"))
            .bind(record_id)
            .bind(scope_id)
            .fetch_optional(pool)
            .await?
            .map_or(0, |_| 1)
    } else {
        sqlx::query(&patch_statement(table, &columns))
            .bind(Value::Object(patch.clone()))
            .bind(record_id)
            .bind(scope_id)
            .execute(pool)
            .await?
            .rows_affected()
    };

    if rows_affected == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// [`RecordRepository`] over one Postgres table.
pub struct PgRecordRepository {
    pool: PgPool,
    entity: EntityType,
}

impl PgRecordRepository {
    pub fn new(pool: PgPool, entity: EntityType) -> Self {
        Self { pool, entity }
    }
}

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn patch(
        &self,
        scope_id: Uuid,
        record_id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<(), DbError> {
        patch_record(&self.pool, self.entity, scope_id, record_id, patch).await
    }
}
