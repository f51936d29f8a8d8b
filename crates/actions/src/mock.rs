//! Test doubles for the collaborators the executors talk to.
//!
//! Useful in unit and integration tests where a real mail relay, HTTP
//! endpoint or sandbox is either unavailable or irrelevant.  Every double
//! records the calls it receives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;

use crate::document::DocumentGenerator;
use crate::email::{EmailAck, EmailMessage, EmailTransport};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::script::ScriptEvaluator;

/// Email transport that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingEmailTransport {
    failure: Option<String>,
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl RecordingEmailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that rejects every message with `msg`.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self {
            failure: Some(msg.into()),
            sent: Arc::default(),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingEmailTransport {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<EmailAck> {
        if let Some(msg) = &self.failure {
            bail!("{msg}");
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(EmailAck {
            message_id: Some(format!("<mock-{}@test>", sent.len())),
            deferred: false,
        })
    }
}

/// HTTP client returning a canned response.
pub struct MockHttpClient {
    status: u16,
    body: String,
    /// Number of leading calls that fail with a transport error.
    fail_first: usize,
    attempts: AtomicUsize,
    calls: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockHttpClient {
    pub fn responding(status: u16, body: impl Into<String>) -> Self {
        Self::failing_first(0, status, body)
    }

    /// Fail the first `n` calls with a transport error, then respond.
    pub fn failing_first(n: usize, status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            fail_first: n,
            attempts: AtomicUsize::new(0),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn call(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        self.calls.lock().unwrap().push(request.clone());
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(anyhow!("connection refused: {}", request.url));
        }
        Ok(HttpResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Evaluator that returns a fixed value and remembers the scripts it saw.
pub struct MockScriptEvaluator {
    value: Value,
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockScriptEvaluator {
    pub fn returning(value: Value) -> Self {
        Self {
            value,
            calls: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ScriptEvaluator for MockScriptEvaluator {
    async fn run(&self, script: &str, context: &Value) -> anyhow::Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((script.to_owned(), context.clone()));
        Ok(self.value.clone())
    }
}

/// Generator that hands out sequential document ids.
#[derive(Default)]
pub struct MockDocumentGenerator {
    pub calls: Arc<Mutex<Vec<(String, Value, String)>>>,
}

impl MockDocumentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentGenerator for MockDocumentGenerator {
    async fn generate(&self, template: &str, data: &Value, recipient: &str) -> anyhow::Result<String> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((template.to_owned(), data.clone(), recipient.to_owned()));
        Ok(format!("doc-{}", calls.len()))
    }
}
