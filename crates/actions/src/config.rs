//! Typed action configurations.
//!
//! Workflow actions store their config as loose JSON.  Before an executor runs,
//! the config is parsed into the variant of [`ActionConfig`] matching the
//! action's type, so executors only ever see the fields their kind needs.
//! Parsing is where missing or malformed fields turn into
//! [`ActionError::MissingField`] / [`ActionError::InvalidField`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use db::models::{ActionType, EntityType};
use reqwest::header::{HeaderName, HeaderValue};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::ActionError;
use crate::http::HttpMethod;

/// Upper bound for the webhook `retries` field.
pub const MAX_WEBHOOK_RETRIES: u32 = 5;

const PRIORITIES: [&str; 4] = ["low", "medium", "high", "urgent"];

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

/// Field accessors that report errors in terms of the action type.
struct ConfigReader<'a> {
    action_type: ActionType,
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> ConfigReader<'a> {
    fn new(action_type: ActionType, config: &'a Value) -> Result<Self, ActionError> {
        let fields = match config {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => {
                return Err(ActionError::InvalidField {
                    action_type,
                    field: "config",
                    reason: "expected a JSON object".into(),
                });
            }
        };
        Ok(Self { action_type, fields })
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields
            .and_then(|f| f.get(field))
            .filter(|v| !v.is_null())
    }

    fn missing(&self, field: &'static str) -> ActionError {
        ActionError::MissingField {
            action_type: self.action_type,
            field,
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> ActionError {
        ActionError::InvalidField {
            action_type: self.action_type,
            field,
            reason: reason.into(),
        }
    }

    fn optional_str(&self, field: &'static str) -> Result<Option<String>, ActionError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(self.invalid(field, "expected a string")),
        }
    }

    fn required_str(&self, field: &'static str) -> Result<String, ActionError> {
        self.optional_str(field)?.ok_or_else(|| self.missing(field))
    }

    fn required_value(&self, field: &'static str) -> Result<Value, ActionError> {
        self.get(field).cloned().ok_or_else(|| self.missing(field))
    }

    fn optional_uuid(&self, field: &'static str) -> Result<Option<Uuid>, ActionError> {
        self.optional_str(field)?
            .map(|s| {
                Uuid::parse_str(s.trim()).map_err(|e| self.invalid(field, format!("not a UUID: {e}")))
            })
            .transpose()
    }

    fn required_uuid(&self, field: &'static str) -> Result<Uuid, ActionError> {
        self.optional_uuid(field)?.ok_or_else(|| self.missing(field))
    }

    fn required_object(&self, field: &'static str) -> Result<Map<String, Value>, ActionError> {
        match self.get(field) {
            None => Err(self.missing(field)),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(self.invalid(field, "expected an object")),
        }
    }

    fn priority(&self, field: &'static str) -> Result<String, ActionError> {
        match self.optional_str(field)? {
            None => Ok("medium".to_owned()),
            Some(p) => {
                let lower = p.to_ascii_lowercase();
                if PRIORITIES.contains(&lower.as_str()) {
                    Ok(lower)
                } else {
                    Err(self.invalid(field, format!("expected one of {PRIORITIES:?}, got '{p}'")))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-kind configs
// ---------------------------------------------------------------------------

/// Who receives an in-app notification.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyTarget {
    /// Everyone in the workflow's scope.
    Scope,
    User(Uuid),
    Role(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifyConfig {
    pub title: String,
    pub message: String,
    pub target: NotifyTarget,
    /// Presentation hint (`info`, `warning`, ...).
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailConfig {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: String,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentConfig {
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub building_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecordConfig {
    pub entity_type: EntityType,
    pub record_id: Uuid,
    pub patch: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    /// `None` means "send the triggering event data".
    pub body: Option<Value>,
    /// Extra attempts after a transport failure.
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptConfig {
    pub script_body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentConfig {
    pub template: String,
    pub data: Value,
    pub recipient: String,
}

/// A parsed action config: one variant per [`ActionType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionConfig {
    Notify(NotifyConfig),
    Email(EmailConfig),
    CreateTask(TaskConfig),
    CreateIncident(IncidentConfig),
    UpdateRecord(UpdateRecordConfig),
    Webhook(WebhookConfig),
    RunScript(ScriptConfig),
    GenerateDocument(DocumentConfig),
}

impl ActionConfig {
    /// Parse the (already rendered) JSON config of an action of `action_type`.
    pub fn parse(action_type: ActionType, config: &Value) -> Result<Self, ActionError> {
        let r = ConfigReader::new(action_type, config)?;
        let parsed = match action_type {
            ActionType::Notify => Self::Notify(parse_notify(&r)?),
            ActionType::Email => Self::Email(parse_email(&r)?),
            ActionType::CreateTask => Self::CreateTask(parse_task(&r)?),
            ActionType::CreateIncident => Self::CreateIncident(parse_incident(&r)?),
            ActionType::UpdateRecord => Self::UpdateRecord(parse_update_record(&r)?),
            ActionType::Webhook => Self::Webhook(parse_webhook(&r)?),
            ActionType::RunScript => Self::RunScript(ScriptConfig {
                script_body: r.required_str("scriptBody")?,
            }),
            ActionType::GenerateDocument => Self::GenerateDocument(DocumentConfig {
                template: r.required_str("template")?,
                data: r.required_value("data")?,
                recipient: r.required_str("recipient")?,
            }),
        };
        Ok(parsed)
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Notify(_) => ActionType::Notify,
            Self::Email(_) => ActionType::Email,
            Self::CreateTask(_) => ActionType::CreateTask,
            Self::CreateIncident(_) => ActionType::CreateIncident,
            Self::UpdateRecord(_) => ActionType::UpdateRecord,
            Self::Webhook(_) => ActionType::Webhook,
            Self::RunScript(_) => ActionType::RunScript,
            Self::GenerateDocument(_) => ActionType::GenerateDocument,
        }
    }
}

fn parse_notify(r: &ConfigReader<'_>) -> Result<NotifyConfig, ActionError> {
    let title = r.required_str("title")?;
    let message = r.required_str("message")?;
    let target = match (r.optional_uuid("userId")?, r.optional_str("userRole")?) {
        (Some(_), Some(_)) => {
            return Err(r.invalid("userId", "userId and userRole are mutually exclusive"));
        }
        (Some(user), None) => NotifyTarget::User(user),
        (None, Some(role)) => NotifyTarget::Role(role),
        (None, None) => NotifyTarget::Scope,
    };
    Ok(NotifyConfig {
        title,
        message,
        target,
        kind: r.optional_str("type")?.unwrap_or_else(|| "info".to_owned()),
    })
}

fn parse_email(r: &ConfigReader<'_>) -> Result<EmailConfig, ActionError> {
    let to: Vec<String> = match r.get("to") {
        None => Vec::new(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_owned())
                    .ok_or_else(|| r.invalid("to", "expected a list of addresses"))
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect(),
        Some(_) => return Err(r.invalid("to", "expected an address or a list of addresses")),
    };
    if to.is_empty() {
        return Err(r.missing("to"));
    }
    Ok(EmailConfig {
        to,
        subject: r.required_str("subject")?,
        body: r.required_str("body")?,
    })
}

fn parse_due_date(r: &ConfigReader<'_>) -> Result<Option<DateTime<Utc>>, ActionError> {
    let Some(raw) = r.optional_str("dueDate")? else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| r.invalid("dueDate", format!("'{raw}' is not an RFC 3339 timestamp or YYYY-MM-DD date")))
}

fn parse_task(r: &ConfigReader<'_>) -> Result<TaskConfig, ActionError> {
    Ok(TaskConfig {
        title: r.required_str("title")?,
        description: r.optional_str("description")?,
        assignee: r.optional_str("assignee")?,
        priority: r.priority("priority")?,
        due_date: parse_due_date(r)?,
    })
}

fn parse_incident(r: &ConfigReader<'_>) -> Result<IncidentConfig, ActionError> {
    Ok(IncidentConfig {
        title: r.required_str("title")?,
        description: r.optional_str("description")?,
        priority: r.priority("priority")?,
        building_id: r.optional_uuid("buildingId")?,
        unit_id: r.optional_uuid("unitId")?,
    })
}

fn parse_update_record(r: &ConfigReader<'_>) -> Result<UpdateRecordConfig, ActionError> {
    let entity_type = r
        .required_str("entityType")?
        .parse::<EntityType>()
        .map_err(|e| r.invalid("entityType", e))?;
    Ok(UpdateRecordConfig {
        entity_type,
        record_id: r.required_uuid("recordId")?,
        patch: r.required_object("patch")?,
    })
}

fn parse_webhook(r: &ConfigReader<'_>) -> Result<WebhookConfig, ActionError> {
    let url = r.required_str("url")?;
    match reqwest::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => {
            return Err(r.invalid("url", format!("unsupported scheme '{}'", parsed.scheme())));
        }
        Err(e) => return Err(r.invalid("url", e.to_string())),
    }

    let method = match r.optional_str("method")? {
        None => HttpMethod::Post,
        Some(m) => m.parse::<HttpMethod>().map_err(|e| r.invalid("method", e))?,
    };

    let headers = match r.get("headers") {
        None => BTreeMap::new(),
        Some(Value::Object(map)) => {
            let mut headers = BTreeMap::new();
            for (name, v) in map {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if HeaderName::from_bytes(name.as_bytes()).is_err() {
                    return Err(r.invalid("headers", format!("invalid header name '{name}'")));
                }
                if HeaderValue::from_str(&value).is_err() {
                    return Err(r.invalid("headers", format!("invalid value for header '{name}'")));
                }
                headers.insert(name.clone(), value);
            }
            headers
        }
        Some(_) => return Err(r.invalid("headers", "expected an object of header values")),
    };

    let retries = match r.get("retries") {
        None => 0,
        Some(v) => match v.as_u64() {
            Some(n) if n <= u64::from(MAX_WEBHOOK_RETRIES) => n as u32,
            _ => {
                return Err(r.invalid(
                    "retries",
                    format!("expected an integer between 0 and {MAX_WEBHOOK_RETRIES}"),
                ));
            }
        },
    };

    Ok(WebhookConfig {
        url,
        method,
        headers,
        body: r.get("body").cloned(),
        retries,
    })
}
