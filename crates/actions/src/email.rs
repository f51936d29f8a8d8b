//! `email`: hands messages to an [`EmailTransport`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use db::models::ActionType;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::traits::{ActionContext, ActionExecutor};
use crate::ActionError;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Acknowledgement returned by a transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// `true` when the message was accepted but not handed to a mail server.
    pub deferred: bool,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<EmailAck>;
}

/// Logs the message and acknowledges it as deferred.
#[derive(Debug, Default, Clone)]
pub struct DeferredTransport;

#[async_trait]
impl EmailTransport for DeferredTransport {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<EmailAck> {
        info!(
            to = ?message.to,
            subject = %message.subject,
            "no SMTP relay configured, email deferred"
        );
        Ok(EmailAck { message_id: None, deferred: true })
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub timeout: Duration,
}

/// STARTTLS relay through `lettre`.
pub struct SmtpEmailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailTransport {
    pub fn new(settings: &SmtpSettings) -> anyhow::Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .with_context(|| format!("invalid sender address '{}'", settings.from))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .with_context(|| format!("configuring SMTP relay {}", settings.host))?
            .port(settings.port)
            .timeout(Some(settings.timeout));
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self { mailer: builder.build(), from })
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<EmailAck> {
        let message_id = format!("<{}@workflow-engine>", Uuid::new_v4());

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.as_str())
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_PLAIN);
        for address in &message.to {
            let mailbox: Mailbox = address
                .parse()
                .with_context(|| format!("invalid recipient address '{address}'"))?;
            builder = builder.to(mailbox);
        }
        let email = builder
            .body(message.body.clone())
            .context("building email")?;

        self.mailer.send(email).await.context("SMTP delivery")?;
        Ok(EmailAck { message_id: Some(message_id), deferred: false })
    }
}

pub struct EmailExecutor {
    transport: Arc<dyn EmailTransport>,
}

impl EmailExecutor {
    pub fn new(transport: Arc<dyn EmailTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ActionExecutor for EmailExecutor {
    type Config = EmailConfig;
    const ACTION_TYPE: ActionType = ActionType::Email;

    async fn execute(&self, config: EmailConfig, _ctx: &ActionContext) -> Result<Value, ActionError> {
        let message = EmailMessage {
            to: config.to,
            subject: config.subject,
            body: config.body,
        };
        let ack = self
            .transport
            .send(&message)
            .await
            .map_err(|e| ActionError::execution(Self::ACTION_TYPE, e))?;

        serde_json::to_value(ack).map_err(|e| ActionError::execution(Self::ACTION_TYPE, e))
    }
}
