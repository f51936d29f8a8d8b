//! Records shared by the store and the engine.
//!
//! These are *persistence* models: they describe what a workflow, an action,
//! an execution record or an engine-created entity looks like when it is
//! stored.  Behaviour (matching, evaluation, execution) lives in the `engine`
//! and `actions` crates.  JSON shapes use camelCase so the same records can be
//! exchanged with the admin UI unchanged.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// A `{fact, operator, value}` predicate evaluated against event data.
///
/// The operator is kept as a string: an unknown operator is a malformed rule,
/// which the evaluator treats as "does not match" rather than refusing to
/// load the workflow.  The same holds for a missing `fact` or `operator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCondition {
    #[serde(default)]
    pub fact: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl FactCondition {
    pub fn new(fact: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            fact: fact.into(),
            operator: operator.into(),
            value,
        }
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Discriminant of [`Trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Event,
    Manual,
    Scheduled,
    Webhook,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => write!(f, "event"),
            Self::Manual => write!(f, "manual"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

/// Filter applied to events for `event` and `manual` triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    /// When set, only events of exactly this type match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// AND-combined workflow-level conditions.
    #[serde(default)]
    pub conditions: Vec<FactCondition>,
}

/// Wall-clock schedule.  Evaluated by the external scheduler, never by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

impl ScheduleTrigger {
    /// Exactly one of `cronExpr` / `frequency` must be present.
    pub fn is_well_formed(&self) -> bool {
        self.cron_expr.is_some() != self.frequency.is_some()
    }
}

/// Origin of a webhook-triggered workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTrigger {
    pub url: String,
    #[serde(default = "default_webhook_method")]
    pub method: String,
}

fn default_webhook_method() -> String {
    "POST".to_owned()
}

/// How a workflow becomes eligible to run.  One config shape per trigger type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Reacts to business events passed to `dispatch_event`.
    Event(EventTrigger),
    /// Run on demand by id; also considered by event dispatch.
    Manual(EventTrigger),
    /// Fired by the external scheduler through a targeted run.
    Scheduled(ScheduleTrigger),
    /// Fired by an inbound webhook through a targeted run.
    Webhook(WebhookTrigger),
}

impl Trigger {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Event(_) => TriggerType::Event,
            Self::Manual(_) => TriggerType::Manual,
            Self::Scheduled(_) => TriggerType::Scheduled,
            Self::Webhook(_) => TriggerType::Webhook,
        }
    }

    /// The event filter, for trigger types that carry one.
    pub fn event_filter(&self) -> Option<&EventTrigger> {
        match self {
            Self::Event(filter) | Self::Manual(filter) => Some(filter),
            Self::Scheduled(_) | Self::Webhook(_) => None,
        }
    }

    /// Workflow-level conditions (empty for scheduled and webhook triggers).
    pub fn conditions(&self) -> &[FactCondition] {
        self.event_filter()
            .map(|f| f.conditions.as_slice())
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Lifecycle status of a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Paused,
    Archived,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active"   => Ok(Self::Active),
            "paused"   => Ok(Self::Paused),
            "archived" => Ok(Self::Archived),
            other      => Err(format!("unknown workflow status: {other}")),
        }
    }
}

/// The kinds of step a workflow can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Notify,
    Email,
    CreateTask,
    CreateIncident,
    UpdateRecord,
    Webhook,
    RunScript,
    GenerateDocument,
}

impl ActionType {
    pub const ALL: [ActionType; 8] = [
        Self::Notify,
        Self::Email,
        Self::CreateTask,
        Self::CreateIncident,
        Self::UpdateRecord,
        Self::Webhook,
        Self::RunScript,
        Self::GenerateDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notify => "notify",
            Self::Email => "email",
            Self::CreateTask => "create_task",
            Self::CreateIncident => "create_incident",
            Self::UpdateRecord => "update_record",
            Self::Webhook => "webhook",
            Self::RunScript => "run_script",
            Self::GenerateDocument => "generate_document",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown action type: {s}"))
    }
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAction {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub action_type: ActionType,
    /// Stored as written by the admin UI; parsed into a typed config at execution time.
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub conditions: Vec<FactCondition>,
    pub order: i32,
}

/// A complete workflow definition with its actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: Uuid,
    pub scope_id: Uuid,
    pub name: String,
    pub trigger: Trigger,
    pub is_active: bool,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub actions: Vec<WorkflowAction>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor: an active workflow with no actions.
    pub fn new(scope_id: Uuid, name: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope_id,
            name: name.into(),
            trigger,
            is_active: true,
            status: WorkflowStatus::Active,
            actions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append an action at the next free position.
    pub fn with_action(
        mut self,
        action_type: ActionType,
        config: Value,
        conditions: Vec<FactCondition>,
    ) -> Self {
        let order = self.actions.iter().map(|a| a.order).max().map_or(1, |o| o + 1);
        self.actions.push(WorkflowAction {
            id: Uuid::new_v4(),
            workflow_id: self.id,
            action_type,
            config,
            conditions,
            order,
        });
        self
    }

    /// Only active, non-paused, non-archived workflows may run.
    pub fn is_eligible(&self) -> bool {
        self.is_active && self.status == WorkflowStatus::Active
    }

    /// Actions in ascending `order`.
    pub fn ordered_actions(&self) -> Vec<&WorkflowAction> {
        let mut actions: Vec<&WorkflowAction> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.order);
        actions
    }
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// Possible statuses for a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed"  => Ok(Self::Failed),
            other     => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// Outcome of a single action within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Skipped,
    Error,
}

/// One ledger entry of a [`WorkflowExecution`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub action_id: Uuid,
    pub action_type: ActionType,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the action did not run (skipped) or which error class it hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn success(action: &WorkflowAction, result: Value, duration_ms: u64) -> Self {
        Self {
            action_id: action.id,
            action_type: action.action_type,
            status: ActionStatus::Success,
            result: Some(result),
            error: None,
            reason: None,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn skipped(action: &WorkflowAction, reason: impl Into<String>) -> Self {
        Self {
            action_id: action.id,
            action_type: action.action_type,
            status: ActionStatus::Skipped,
            result: None,
            error: None,
            reason: Some(reason.into()),
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn error(
        action: &WorkflowAction,
        kind: impl Into<String>,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            action_id: action.id,
            action_type: action.action_type,
            status: ActionStatus::Error,
            result: None,
            error: Some(message.into()),
            reason: Some(kind.into()),
            duration_ms,
            timestamp: Utc::now(),
        }
    }
}

/// Audit record of one run of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    pub trigger_data: Value,
    #[serde(default)]
    pub results: Vec<ActionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// A fresh record in `running` status.
    pub fn start(workflow_id: Uuid, trigger_data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: ExecutionStatus::Running,
            trigger_data,
            results: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Entities created by actions
// ---------------------------------------------------------------------------

/// In-app notification created by the `notify` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub scope_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_role: Option<String>,
    pub title: String,
    pub message: String,
    pub kind: String,
}

/// Task created by the `create_task` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub scope_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// Maintenance incident created by the `create_incident` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    pub scope_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub building_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
}

/// Entity kinds the `update_record` action may patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Contract,
    Payment,
    Building,
    Unit,
    Tenant,
    Owner,
    Task,
    Incident,
}

impl EntityType {
    pub const ALL: [EntityType; 8] = [
        Self::Contract,
        Self::Payment,
        Self::Building,
        Self::Unit,
        Self::Tenant,
        Self::Owner,
        Self::Task,
        Self::Incident,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Payment => "payment",
            Self::Building => "building",
            Self::Unit => "unit",
            Self::Tenant => "tenant",
            Self::Owner => "owner",
            Self::Task => "task",
            Self::Incident => "incident",
        }
    }

    /// Backing table in the Postgres schema.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Contract => "contracts",
            Self::Payment => "payments",
            Self::Building => "buildings",
            Self::Unit => "units",
            Self::Tenant => "tenants",
            Self::Owner => "owners",
            Self::Task => "tasks",
            Self::Incident => "incidents",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    /// Case-insensitive; accepts the singular name (`"contract"`, `"Contract"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("unknown entity type: {s}"))
    }
}
