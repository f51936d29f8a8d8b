//! `webhook`: outbound HTTP call with retries on transport failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use db::models::ActionType;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::WebhookConfig;
use crate::http::{HttpClient, HttpRequest};
use crate::traits::{ActionContext, ActionExecutor};
use crate::ActionError;

pub struct WebhookExecutor {
    client: Arc<dyn HttpClient>,
    /// Base delay for exponential back-off between attempts.
    retry_base_delay: Duration,
}

impl WebhookExecutor {
    pub fn new(client: Arc<dyn HttpClient>, retry_base_delay: Duration) -> Self {
        Self { client, retry_base_delay }
    }
}

#[async_trait]
impl ActionExecutor for WebhookExecutor {
    type Config = WebhookConfig;
    const ACTION_TYPE: ActionType = ActionType::Webhook;

    /// Any HTTP status counts as delivered; the status is part of the result.
    /// Without an explicit body, POST, PUT and PATCH send the event data and
    /// other methods send nothing.
    async fn execute(&self, config: WebhookConfig, ctx: &ActionContext) -> Result<Value, ActionError> {
        let request = HttpRequest {
            method: config.method,
            url: config.url,
            headers: config.headers.into_iter().collect(),
            body: config
                .body
                .or_else(|| config.method.carries_body().then(|| ctx.data.clone())),
        };

        let mut attempts = 0u32;
        loop {
            match self.client.call(request.clone()).await {
                Ok(response) => {
                    info!(url = %request.url, status = response.status, attempts = attempts + 1, "webhook delivered");
                    return Ok(json!({
                        "status": response.status,
                        "responseBody": response.json_or_text(),
                    }));
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > config.retries {
                        return Err(ActionError::execution(
                            Self::ACTION_TYPE,
                            e.context(format!("gave up after {attempts} attempt(s)")),
                        ));
                    }

                    let delay = self.retry_base_delay * 2u32.pow(attempts - 1);
                    warn!(
                        url = %request.url,
                        "webhook transport error (attempt {}/{}), retrying in {:?}: {:#}",
                        attempts, config.retries + 1, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, ReqwestHttpClient};
    use crate::mock::MockHttpClient;
    use std::collections::BTreeMap;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx(data: Value) -> ActionContext {
        ActionContext {
            scope_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            event_type: "pago.recibido".into(),
            data,
        }
    }

    fn config(url: String, retries: u32) -> WebhookConfig {
        WebhookConfig {
            url,
            method: HttpMethod::Post,
            headers: BTreeMap::new(),
            body: None,
            retries,
        }
    }

    #[tokio::test]
    async fn posts_event_data_by_default_and_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pagos"))
            .and(body_json(json!({ "monto": 1500 })))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
            .expect(1)
            .mount(&server)
            .await;

        let executor = WebhookExecutor::new(
            Arc::new(ReqwestHttpClient::new(Duration::from_secs(5)).unwrap()),
            Duration::from_millis(1),
        );
        let result = executor
            .execute(config(format!("{}/pagos", server.uri()), 3), &ctx(json!({ "monto": 1500 })))
            .await
            .expect("a 500 response is still a delivered webhook");

        assert_eq!(result, json!({ "status": 500, "responseBody": { "error": "boom" } }));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_until_success() {
        let client = Arc::new(MockHttpClient::failing_first(2, 200, "ok"));
        let executor = WebhookExecutor::new(client.clone(), Duration::from_millis(100));

        let result = executor
            .execute(config("https://hooks.example.com/x".into(), 2), &ctx(json!({})))
            .await
            .unwrap();

        assert_eq!(result["status"], 200);
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let client = Arc::new(MockHttpClient::failing_first(10, 200, "ok"));
        let executor = WebhookExecutor::new(client.clone(), Duration::from_millis(100));

        let err = executor
            .execute(config("https://hooks.example.com/x".into(), 1), &ctx(json!({})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "execution_error");
        assert!(err.to_string().contains("gave up after 2 attempt(s)"));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn explicit_body_replaces_event_data() {
        let client = Arc::new(MockHttpClient::responding(204, ""));
        let executor = WebhookExecutor::new(client.clone(), Duration::from_millis(1));
        let mut cfg = config("https://hooks.example.com/x".into(), 0);
        cfg.body = Some(json!({ "custom": true }));

        executor.execute(cfg, &ctx(json!({ "ignored": 1 }))).await.unwrap();

        let calls = client.calls();
        assert_eq!(calls[0].body, Some(json!({ "custom": true })));
    }

    #[tokio::test]
    async fn get_and_delete_send_no_default_body() {
        let client = Arc::new(MockHttpClient::responding(200, "ok"));
        let executor = WebhookExecutor::new(client.clone(), Duration::from_millis(1));

        for verb in [HttpMethod::Get, HttpMethod::Delete] {
            let mut cfg = config("https://hooks.example.com/x".into(), 0);
            cfg.method = verb;
            executor.execute(cfg, &ctx(json!({ "monto": 1500 }))).await.unwrap();
        }
        let mut put = config("https://hooks.example.com/x".into(), 0);
        put.method = HttpMethod::Put;
        executor.execute(put, &ctx(json!({ "monto": 1500 }))).await.unwrap();

        let calls = client.calls();
        assert_eq!(calls[0].body, None);
        assert_eq!(calls[1].body, None);
        assert_eq!(calls[2].body, Some(json!({ "monto": 1500 })));
    }
}
