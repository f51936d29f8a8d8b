//! `notify`: in-app notification records.

use std::sync::Arc;

use async_trait::async_trait;
use db::EntityStore;
use db::models::{ActionType, NewNotification};
use serde_json::{Value, json};
use tracing::info;

use crate::config::{NotifyConfig, NotifyTarget};
use crate::traits::{ActionContext, ActionExecutor};
use crate::ActionError;

pub struct NotifyExecutor {
    store: Arc<dyn EntityStore>,
}

impl NotifyExecutor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionExecutor for NotifyExecutor {
    type Config = NotifyConfig;
    const ACTION_TYPE: ActionType = ActionType::Notify;

    async fn execute(&self, config: NotifyConfig, ctx: &ActionContext) -> Result<Value, ActionError> {
        let (user_id, user_role) = match config.target {
            NotifyTarget::Scope => (None, None),
            NotifyTarget::User(id) => (Some(id), None),
            NotifyTarget::Role(role) => (None, Some(role)),
        };

        let notification = NewNotification {
            scope_id: ctx.scope_id,
            user_id,
            user_role,
            title: config.title,
            message: config.message,
            kind: config.kind,
        };

        let id = self
            .store
            .create_notification(&notification)
            .await
            .map_err(|e| ActionError::execution(Self::ACTION_TYPE, e))?;

        info!(notification_id = %id, scope_id = %ctx.scope_id, "notification created");
        Ok(json!({ "notificationId": id }))
    }
}
