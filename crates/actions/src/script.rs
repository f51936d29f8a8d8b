//! `run_script`: delegates to an external sandboxed evaluator.
//!
//! The engine never interprets scripts itself.  The evaluator receives the
//! script source and a read-only snapshot of the run (`{event, context}`) and
//! answers with either a value or an error.

use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use db::models::ActionType;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::ScriptConfig;
use crate::http::{HttpClient, HttpMethod, HttpRequest};
use crate::traits::{ActionContext, ActionExecutor};
use crate::ActionError;

#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    async fn run(&self, script: &str, context: &Value) -> anyhow::Result<Value>;
}

/// Used when no evaluator endpoint is configured.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredScriptEvaluator;

#[async_trait]
impl ScriptEvaluator for UnconfiguredScriptEvaluator {
    async fn run(&self, _script: &str, _context: &Value) -> anyhow::Result<Value> {
        bail!("no script evaluator configured")
    }
}

/// Posts `{script, context}` to a sandbox service.
///
/// The service answers `{"value": ...}` on success or `{"error": "..."}`.
pub struct RemoteScriptEvaluator {
    client: Arc<dyn HttpClient>,
    endpoint: String,
}

impl RemoteScriptEvaluator {
    pub fn new(client: Arc<dyn HttpClient>, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }
}

#[async_trait]
impl ScriptEvaluator for RemoteScriptEvaluator {
    async fn run(&self, script: &str, context: &Value) -> anyhow::Result<Value> {
        let response = self
            .client
            .call(HttpRequest {
                method: HttpMethod::Post,
                url: self.endpoint.clone(),
                headers: vec![],
                body: Some(json!({ "script": script, "context": context })),
            })
            .await
            .context("calling script evaluator")?;

        let body = response.json_or_text();
        if let Some(message) = body.get("error").filter(|e| !e.is_null()) {
            let message = message.as_str().map_or_else(|| message.to_string(), str::to_owned);
            bail!("script failed: {message}");
        }
        if !response.is_success() {
            bail!("script evaluator returned HTTP {}", response.status);
        }
        debug!(status = response.status, "script evaluated");
        body.get("value")
            .cloned()
            .ok_or_else(|| anyhow!("script evaluator response has no 'value'"))
    }
}

pub struct RunScriptExecutor {
    evaluator: Arc<dyn ScriptEvaluator>,
}

impl RunScriptExecutor {
    pub fn new(evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl ActionExecutor for RunScriptExecutor {
    type Config = ScriptConfig;
    const ACTION_TYPE: ActionType = ActionType::RunScript;

    async fn execute(&self, config: ScriptConfig, ctx: &ActionContext) -> Result<Value, ActionError> {
        self.evaluator
            .run(&config.script_body, &ctx.snapshot())
            .await
            .map_err(|e| ActionError::execution(Self::ACTION_TYPE, e))
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
            event_type: "pago.recibido".into(),
            data: json!({ "monto": 1500 }),
        }
    }

    #[tokio::test]
    async fn evaluator_receives_script_and_snapshot() {
        let client = Arc::new(MockHttpClient::responding(200, r#"{"value": 3000}"#));
        let executor = RunScriptExecutor::new(Arc::new(RemoteScriptEvaluator::new(
            client.clone(),
            "http://sandbox.internal/run",
        )));
        let ctx = ctx();

        let result = executor
            .execute(ScriptConfig { script_body: "event.monto * 2".into() }, &ctx)
            .await
            .unwrap();

        assert_eq!(result, json!(3000));
        let calls = client.calls();
        assert_eq!(calls[0].url, "http://sandbox.internal/run");
        assert_eq!(
            calls[0].body,
            Some(json!({ "script": "event.monto * 2", "context": ctx.snapshot() }))
        );
    }

    #[tokio::test]
    async fn script_errors_become_execution_errors() {
        let client = Arc::new(MockHttpClient::responding(200, r#"{"error": "ReferenceError: x"}"#));
        let executor = RunScriptExecutor::new(Arc::new(RemoteScriptEvaluator::new(client, "http://s/run")));

        let err = executor
            .execute(ScriptConfig { script_body: "x".into() }, &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "execution_error");
        assert!(err.to_string().contains("ReferenceError: x"));
    }

    #[tokio::test]
    async fn unconfigured_evaluator_fails() {
        let executor = RunScriptExecutor::new(Arc::new(UnconfiguredScriptEvaluator));
        let err = executor
            .execute(ScriptConfig { script_body: "1".into() }, &ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no script evaluator configured"));
    }
}
