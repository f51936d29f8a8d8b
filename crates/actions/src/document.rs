//! `generate_document`: delegates rendering to a document service.

use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use db::models::ActionType;
use serde_json::{Value, json};
use tracing::info;

use crate::config::DocumentConfig;
use crate::http::{HttpClient, HttpMethod, HttpRequest};
use crate::traits::{ActionContext, ActionExecutor};
use crate::ActionError;

/// `Generate(template, data, recipient) -> handle`.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(&self, template: &str, data: &Value, recipient: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Default, Clone)]
pub struct UnconfiguredDocumentGenerator;

#[async_trait]
impl DocumentGenerator for UnconfiguredDocumentGenerator {
    async fn generate(&self, _template: &str, _data: &Value, _recipient: &str) -> anyhow::Result<String> {
        bail!("no document service configured")
    }
}

/// Posts `{template, data, recipient}` to `<base>/documents` and expects `{"documentId": ...}`.
pub struct RemoteDocumentGenerator {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl RemoteDocumentGenerator {
    pub fn new(client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait]
impl DocumentGenerator for RemoteDocumentGenerator {
    async fn generate(&self, template: &str, data: &Value, recipient: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .call(HttpRequest {
                method: HttpMethod::Post,
                url: format!("{}/documents", self.base_url.trim_end_matches('/')),
                headers: vec![],
                body: Some(json!({ "template": template, "data": data, "recipient": recipient })),
            })
            .await
            .context("calling document service")?;

        if !response.is_success() {
            bail!("document service returned HTTP {}: {}", response.status, response.body);
        }
        let body = response.json_or_text();
        match body.get("documentId") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(other) if !other.is_null() => Ok(other.to_string()),
            _ => Err(anyhow!("document service response has no 'documentId'")),
        }
    }
}

pub struct GenerateDocumentExecutor {
    generator: Arc<dyn DocumentGenerator>,
}

impl GenerateDocumentExecutor {
    pub fn new(generator: Arc<dyn DocumentGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl ActionExecutor for GenerateDocumentExecutor {
    type Config = DocumentConfig;
    const ACTION_TYPE: ActionType = ActionType::GenerateDocument;

    async fn execute(&self, config: DocumentConfig, _ctx: &ActionContext) -> Result<Value, ActionError> {
        let document_id = self
            .generator
            .generate(&config.template, &config.data, &config.recipient)
            .await
            .map_err(|e| ActionError::execution(Self::ACTION_TYPE, e))?;

        info!(%document_id, template = %config.template, "document requested");
        Ok(json!({ "documentId": document_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHttpClient;
    use uuid::Uuid;

    fn ctx() -> ActionContext {
        ActionContext {
            scope_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            event_type: "contrato.firmado".into(),
            data: json!({}),
        }
    }

    fn config() -> DocumentConfig {
        DocumentConfig {
            template: "contrato-arrendamiento".into(),
            data: json!({ "tenant": "Ana" }),
            recipient: "ana@example.com".into(),
        }
    }

    #[tokio::test]
    async fn returns_document_handle() {
        let client = Arc::new(MockHttpClient::responding(201, r#"{"documentId": "doc-42"}"#));
        let executor = GenerateDocumentExecutor::new(Arc::new(RemoteDocumentGenerator::new(
            client.clone(),
            "http://docs.internal/",
        )));

        let result = executor.execute(config(), &ctx()).await.unwrap();

        assert_eq!(result, json!({ "documentId": "doc-42" }));
        assert_eq!(client.calls()[0].url, "http://docs.internal/documents");
    }

    #[tokio::test]
    async fn service_errors_are_execution_errors() {
        let client = Arc::new(MockHttpClient::responding(500, "template missing"));
        let executor = GenerateDocumentExecutor::new(Arc::new(RemoteDocumentGenerator::new(client, "http://docs")));
        let err = executor.execute(config(), &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn unconfigured_generator_fails() {
        let executor = GenerateDocumentExecutor::new(Arc::new(UnconfiguredDocumentGenerator));
        let err = executor.execute(config(), &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), "execution_error");
    }
}
