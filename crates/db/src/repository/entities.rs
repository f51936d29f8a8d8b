//! Inserts for the entities created by workflow actions.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{NewIncident, NewNotification, NewTask},
};

pub async fn create_notification(pool: &PgPool, n: &NewNotification) -> Result<Uuid, DbError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO notifications (id, scope_id, user_id, user_role, title, message, kind)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(n.scope_id)
    .bind(n.user_id)
    .bind(&n.user_role)
    .bind(&n.title)
    .bind(&n.message)
    .bind(&n.kind)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn create_task(pool: &PgPool, t: &NewTask) -> Result<Uuid, DbError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO tasks (id, scope_id, title, description, assignee, priority, due_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(t.scope_id)
    .bind(&t.title)
    .bind(&t.description)
    .bind(&t.assignee)
    .bind(&t.priority)
    .bind(t.due_date)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn create_incident(pool: &PgPool, i: &NewIncident) -> Result<Uuid, DbError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO incidents (id, scope_id, title, description, priority, building_id, unit_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(i.scope_id)
    .bind(&i.title)
    .bind(&i.description)
    .bind(&i.priority)
    .bind(i.building_id)
    .bind(i.unit_id)
    .execute(pool)
    .await?;
    Ok(id)
}
