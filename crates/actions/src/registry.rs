//! [`ActionExecutors`]: one executor per action kind, selected by `actionType`.

use std::sync::Arc;
use std::time::Duration;

use db::models::ActionType;
use db::{EntityStore, RecordRegistry};
use serde_json::Value;
use tracing::debug;

use crate::config::ActionConfig;
use crate::document::{DocumentGenerator, GenerateDocumentExecutor, UnconfiguredDocumentGenerator};
use crate::email::{DeferredTransport, EmailExecutor, EmailTransport};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::notify::NotifyExecutor;
use crate::record::UpdateRecordExecutor;
use crate::script::{RunScriptExecutor, ScriptEvaluator, UnconfiguredScriptEvaluator};
use crate::task::{CreateIncidentExecutor, CreateTaskExecutor};
use crate::template;
use crate::traits::{ActionContext, ActionExecutor};
use crate::webhook::WebhookExecutor;
use crate::ActionError;

const DEFAULT_WEBHOOK_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Config keys handed to a collaborator as written, without event-data substitution.
fn verbatim_keys(action_type: ActionType) -> &'static [&'static str] {
    match action_type {
        ActionType::RunScript => &["scriptBody"],
        ActionType::GenerateDocument => &["template"],
        _ => &[],
    }
}

pub struct ActionExecutors {
    notify: NotifyExecutor,
    email: EmailExecutor,
    create_task: CreateTaskExecutor,
    create_incident: CreateIncidentExecutor,
    update_record: UpdateRecordExecutor,
    webhook: WebhookExecutor,
    run_script: RunScriptExecutor,
    generate_document: GenerateDocumentExecutor,
}

impl ActionExecutors {
    pub fn builder(entities: Arc<dyn EntityStore>, records: RecordRegistry) -> ActionExecutorsBuilder {
        ActionExecutorsBuilder {
            entities,
            records,
            email: Arc::new(DeferredTransport),
            http: None,
            scripts: Arc::new(UnconfiguredScriptEvaluator),
            documents: Arc::new(UnconfiguredDocumentGenerator),
            webhook_retry_delay: DEFAULT_WEBHOOK_RETRY_DELAY,
        }
    }

    /// Render `raw_config` against the event data, parse it for `action_type`
    /// and run the matching executor.  Script bodies and document templates are
    /// not rendered.
    pub async fn execute(
        &self,
        action_type: ActionType,
        raw_config: &Value,
        ctx: &ActionContext,
    ) -> Result<Value, ActionError> {
        let rendered = template::render_except(raw_config, &ctx.data, verbatim_keys(action_type));
        let config = ActionConfig::parse(action_type, &rendered)?;
        debug!(%action_type, execution_id = %ctx.execution_id, "dispatching action");

        match config {
            ActionConfig::Notify(c) => self.notify.execute(c, ctx).await,
            ActionConfig::Email(c) => self.email.execute(c, ctx).await,
            ActionConfig::CreateTask(c) => self.create_task.execute(c, ctx).await,
            ActionConfig::CreateIncident(c) => self.create_incident.execute(c, ctx).await,
            ActionConfig::UpdateRecord(c) => self.update_record.execute(c, ctx).await,
            ActionConfig::Webhook(c) => self.webhook.execute(c, ctx).await,
            ActionConfig::RunScript(c) => self.run_script.execute(c, ctx).await,
            ActionConfig::GenerateDocument(c) => self.generate_document.execute(c, ctx).await,
        }
    }
}

pub struct ActionExecutorsBuilder {
    entities: Arc<dyn EntityStore>,
    records: RecordRegistry,
    email: Arc<dyn EmailTransport>,
    http: Option<Arc<dyn HttpClient>>,
    scripts: Arc<dyn ScriptEvaluator>,
    documents: Arc<dyn DocumentGenerator>,
    webhook_retry_delay: Duration,
}

impl ActionExecutorsBuilder {
    pub fn with_email_transport(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.email = transport;
        self
    }

    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http = Some(client);
        self
    }

    pub fn with_script_evaluator(mut self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = evaluator;
        self
    }

    pub fn with_document_generator(mut self, generator: Arc<dyn DocumentGenerator>) -> Self {
        self.documents = generator;
        self
    }

    pub fn with_webhook_retry_delay(mut self, delay: Duration) -> Self {
        self.webhook_retry_delay = delay;
        self
    }

    pub fn build(self) -> ActionExecutors {
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::default()));

        ActionExecutors {
            notify: NotifyExecutor::new(Arc::clone(&self.entities)),
            email: EmailExecutor::new(self.email),
            create_task: CreateTaskExecutor::new(Arc::clone(&self.entities)),
            create_incident: CreateIncidentExecutor::new(self.entities),
            update_record: UpdateRecordExecutor::new(self.records),
            webhook: WebhookExecutor::new(http, self.webhook_retry_delay),
            run_script: RunScriptExecutor::new(self.scripts),
            generate_document: GenerateDocumentExecutor::new(self.documents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDocumentGenerator, MockHttpClient, MockScriptEvaluator};
    use db::MemoryStore;
    use db::models::EntityType;
    use serde_json::{Map, json};
    use uuid::Uuid;

    fn ctx(data: Value) -> ActionContext {
        ActionContext {
            scope_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            event_type: "contrato.creado".into(),
            data,
        }
    }

    fn executors(store: &MemoryStore) -> ActionExecutors {
        ActionExecutors::builder(Arc::new(store.clone()), store.record_registry())
            .with_http_client(Arc::new(MockHttpClient::responding(200, "{}")))
            .with_script_evaluator(Arc::new(MockScriptEvaluator::returning(json!(true))))
            .with_document_generator(Arc::new(MockDocumentGenerator::new()))
            .build()
    }

    #[tokio::test]
    async fn config_is_rendered_before_parsing() {
        let store = MemoryStore::new();
        let result = executors(&store)
            .execute(
                ActionType::CreateTask,
                &json!({ "title": "Revisar contrato {{id}}", "priority": "{{prioridad}}" }),
                &ctx(json!({ "id": "c1", "prioridad": "high" })),
            )
            .await
            .unwrap();

        let tasks = store.tasks().await;
        assert_eq!(result["taskId"], json!(tasks[0].0));
        assert_eq!(tasks[0].1.title, "Revisar contrato c1");
        assert_eq!(tasks[0].1.priority, "high");
    }

    #[tokio::test]
    async fn missing_field_fails_before_any_side_effect() {
        let store = MemoryStore::new();
        let err = executors(&store)
            .execute(ActionType::Notify, &json!({ "title": "sin mensaje" }), &ctx(json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::MissingField { field: "message", .. }));
        assert!(store.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn templated_record_id_reaches_repository() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let ctx = ctx(json!({ "pagoId": id }));
        let mut fields = Map::new();
        fields.insert("status".into(), json!("pending"));
        store.insert_record(EntityType::Payment, ctx.scope_id, id, fields).await;

        executors(&store)
            .execute(
                ActionType::UpdateRecord,
                &json!({ "entityType": "payment", "recordId": "{{pagoId}}", "patch": { "status": "paid" } }),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(store.record(EntityType::Payment, id).await.unwrap()["status"], "paid");
    }

    #[tokio::test]
    async fn script_body_and_document_template_reach_collaborators_unrendered() {
        let store = MemoryStore::new();
        let scripts = Arc::new(MockScriptEvaluator::returning(json!("ok")));
        let documents = Arc::new(MockDocumentGenerator::new());
        let executors = ActionExecutors::builder(Arc::new(store.clone()), store.record_registry())
            .with_script_evaluator(scripts.clone())
            .with_document_generator(documents.clone())
            .build();
        let ctx = ctx(json!({ "nombre": "Ana", "correo": "ana@example.com" }));

        executors
            .execute(
                ActionType::RunScript,
                &json!({ "scriptBody": "return greet('{{nombre}}')" }),
                &ctx,
            )
            .await
            .unwrap();
        executors
            .execute(
                ActionType::GenerateDocument,
                &json!({
                    "template": "Hola {{nombre}}",
                    "data": { "nombre": "{{nombre}}" },
                    "recipient": "{{correo}}"
                }),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(scripts.calls.lock().unwrap()[0].0, "return greet('{{nombre}}')");
        let (template, data, recipient) = documents.calls.lock().unwrap()[0].clone();
        assert_eq!(template, "Hola {{nombre}}");
        assert_eq!(data, json!({ "nombre": "Ana" }));
        assert_eq!(recipient, "ana@example.com");
    }

    #[tokio::test]
    async fn every_action_type_is_dispatched() {
        let store = MemoryStore::new();
        let executors = executors(&store);
        let ctx = ctx(json!({}));

        let configs = [
            (ActionType::Notify, json!({ "title": "t", "message": "m" })),
            (ActionType::Email, json!({ "to": "a@example.com", "subject": "s", "body": "b" })),
            (ActionType::CreateTask, json!({ "title": "t" })),
            (ActionType::CreateIncident, json!({ "title": "t" })),
            (ActionType::Webhook, json!({ "url": "https://hooks.example.com" })),
            (ActionType::RunScript, json!({ "scriptBody": "true" })),
            (
                ActionType::GenerateDocument,
                json!({ "template": "t", "data": {}, "recipient": "a@example.com" }),
            ),
        ];
        for (action_type, config) in configs {
            assert!(
                executors.execute(action_type, &config, &ctx).await.is_ok(),
                "{action_type} failed"
            );
        }
        assert_eq!(store.notifications().await.len(), 1);
        assert_eq!(store.incidents().await.len(), 1);
    }
}
