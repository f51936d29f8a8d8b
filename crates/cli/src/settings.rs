//! Process settings: command-line flags with environment fallbacks.

use std::sync::Arc;
use std::time::Duration;

use actions::document::RemoteDocumentGenerator;
use actions::email::{SmtpEmailTransport, SmtpSettings};
use actions::http::{HttpClient, ReqwestHttpClient};
use actions::script::RemoteScriptEvaluator;
use actions::ActionExecutors;
use clap::Args;
use db::PgStore;
use engine::{OrchestratorConfig, WorkflowOrchestrator};
use tracing::info;

#[derive(Debug, Args)]
pub struct DbArgs {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,
}

impl DbArgs {
    pub async fn connect(&self) -> anyhow::Result<PgStore> {
        let pool = db::pool::create_pool(&self.database_url, self.max_connections).await?;
        Ok(PgStore::new(pool))
    }
}

#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Workflows run concurrently per dispatched event.
    #[arg(long, env = "ENGINE_MAX_CONCURRENCY", default_value_t = 8)]
    pub max_concurrency: usize,

    /// Deadline for a single action call, in seconds.
    #[arg(long, env = "ENGINE_ACTION_TIMEOUT_SECS", default_value_t = 30)]
    pub action_timeout_secs: u64,

    /// Outbound HTTP timeout (webhooks, script evaluator, document service).
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 15)]
    pub http_timeout_secs: u64,

    /// SMTP relay; emails are deferred (logged only) when unset.
    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    #[arg(long, env = "SMTP_FROM", default_value = "workflows@localhost")]
    pub smtp_from: String,

    #[arg(long, env = "SCRIPT_EVALUATOR_URL")]
    pub script_evaluator_url: Option<String>,

    #[arg(long, env = "DOCUMENT_SERVICE_URL")]
    pub document_service_url: Option<String>,
}

impl EngineArgs {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrency: self.max_concurrency,
            action_timeout: Duration::from_secs(self.action_timeout_secs),
        }
    }

    /// Wire the executors and the orchestrator over `store`.
    pub fn build_orchestrator(&self, store: &PgStore) -> anyhow::Result<WorkflowOrchestrator> {
        let http: Arc<dyn HttpClient> =
            Arc::new(ReqwestHttpClient::new(Duration::from_secs(self.http_timeout_secs))?);

        let mut builder = ActionExecutors::builder(Arc::new(store.clone()), store.record_registry())
            .with_http_client(Arc::clone(&http));

        match &self.smtp_host {
            Some(host) => {
                let transport = SmtpEmailTransport::new(&SmtpSettings {
                    host: host.clone(),
                    port: self.smtp_port,
                    username: self.smtp_username.clone(),
                    password: self.smtp_password.clone(),
                    from: self.smtp_from.clone(),
                    timeout: Duration::from_secs(self.http_timeout_secs),
                })?;
                info!(%host, port = self.smtp_port, "sending email through SMTP relay");
                builder = builder.with_email_transport(Arc::new(transport));
            }
            None => info!("SMTP_HOST not set, emails will be deferred"),
        }
        if let Some(url) = &self.script_evaluator_url {
            builder = builder
                .with_script_evaluator(Arc::new(RemoteScriptEvaluator::new(Arc::clone(&http), url.clone())));
        }
        if let Some(url) = &self.document_service_url {
            builder = builder
                .with_document_generator(Arc::new(RemoteDocumentGenerator::new(Arc::clone(&http), url.clone())));
        }

        Ok(WorkflowOrchestrator::new(
            Arc::new(store.clone()),
            builder.build(),
            self.orchestrator_config(),
        ))
    }
}
