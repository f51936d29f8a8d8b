//! `update_record`: partial updates through the record registry.
//!
//! Only records owned by the run's scope can be patched.

use async_trait::async_trait;
use db::{DbError, RecordRegistry};
use db::models::ActionType;
use serde_json::{Value, json};
use tracing::info;

use crate::config::UpdateRecordConfig;
use crate::traits::{ActionContext, ActionExecutor};
use crate::ActionError;

pub struct UpdateRecordExecutor {
    registry: RecordRegistry,
}

impl UpdateRecordExecutor {
    pub fn new(registry: RecordRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ActionExecutor for UpdateRecordExecutor {
    type Config = UpdateRecordConfig;
    const ACTION_TYPE: ActionType = ActionType::UpdateRecord;

    async fn execute(&self, config: UpdateRecordConfig, ctx: &ActionContext) -> Result<Value, ActionError> {
        let repository = self.registry.get(config.entity_type).ok_or_else(|| {
            ActionError::execution(
                Self::ACTION_TYPE,
                anyhow::anyhow!("no repository registered for entity type '{}'", config.entity_type),
            )
        })?;

        repository
            .patch(ctx.scope_id, config.record_id, &config.patch)
            .await
            .map_err(|e| match e {
                DbError::NotFound => ActionError::execution(
                    Self::ACTION_TYPE,
                    anyhow::anyhow!(
                        "{} {} not found in scope {}",
                        config.entity_type,
                        config.record_id,
                        ctx.scope_id
                    ),
                ),
                DbError::InvalidColumn(column) => ActionError::InvalidField {
                    action_type: Self::ACTION_TYPE,
                    field: "patch",
                    reason: format!("invalid column name '{column}'"),
                },
                other => ActionError::execution(Self::ACTION_TYPE, other),
            })?;

        info!(entity_type = %config.entity_type, record_id = %config.record_id, "record updated");
        Ok(json!({
            "updated": true,
            "entityType": config.entity_type,
            "recordId": config.record_id,
        }))
    }
}
