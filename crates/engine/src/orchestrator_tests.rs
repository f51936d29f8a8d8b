//! Behavioural tests for the orchestrator.
//!
//! Everything runs against `MemoryStore` and the collaborator doubles from
//! `actions::mock`, so no Postgres, SMTP relay or HTTP endpoint is needed.

use std::sync::Arc;
use std::time::Duration;

use actions::http::{HttpClient, HttpRequest, HttpResponse};
use actions::mock::{MockHttpClient, MockScriptEvaluator};
use actions::ActionExecutors;
use async_trait::async_trait;
use db::models::{
    ActionStatus, ActionType, EventTrigger, ExecutionStatus, FactCondition, Trigger, Workflow,
    WorkflowAction, WorkflowStatus,
};
use db::{ExecutionStore, MemoryStore};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::orchestrator::SKIPPED_REASON;
use crate::recorder::RecorderError;
use crate::{EngineError, OrchestratorConfig, TriggerEvent, WorkflowOrchestrator};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Harness {
    store: MemoryStore,
    scripts: Arc<MockScriptEvaluator>,
    orchestrator: WorkflowOrchestrator,
}

fn harness_with(http: Arc<dyn HttpClient>, config: OrchestratorConfig) -> Harness {
    let store = MemoryStore::new();
    let scripts = Arc::new(MockScriptEvaluator::returning(json!("ok")));
    let executors = ActionExecutors::builder(Arc::new(store.clone()), store.record_registry())
        .with_http_client(http)
        .with_script_evaluator(scripts.clone())
        .with_webhook_retry_delay(Duration::from_millis(1))
        .build();
    let orchestrator = WorkflowOrchestrator::new(Arc::new(store.clone()), executors, config);
    Harness { store, scripts, orchestrator }
}

fn harness() -> Harness {
    harness_with(
        Arc::new(MockHttpClient::responding(200, r#"{"ok": true}"#)),
        OrchestratorConfig::default(),
    )
}

fn on_event(event_type: &str, conditions: Vec<FactCondition>) -> Trigger {
    Trigger::Event(EventTrigger {
        event_type: Some(event_type.to_owned()),
        conditions,
    })
}

fn notify(title: &str) -> Value {
    json!({ "title": title, "message": "Contrato {{id}}" })
}

/// HTTP client that never answers before `delay`.
struct SlowHttpClient {
    delay: Duration,
}

#[async_trait]
impl HttpClient for SlowHttpClient {
    async fn call(&self, _request: HttpRequest) -> anyhow::Result<HttpResponse> {
        tokio::time::sleep(self.delay).await;
        Ok(HttpResponse { status: 200, body: String::new() })
    }
}

// ============================================================
// Dispatch
// ============================================================

#[tokio::test]
async fn notify_workflow_runs_on_matching_event() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(scope, "avisar contrato", on_event("contrato.creado", vec![]))
        .with_action(ActionType::Notify, notify("Nuevo contrato"), vec![]);
    h.store.insert_workflow(wf.clone()).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "contrato.creado", json!({ "id": "c1" })))
        .await
        .unwrap();

    assert_eq!(report.executed_count, 1);
    assert_eq!(report.succeeded_count, 1);
    assert!(report.workflow_errors.is_empty());

    let summary = &report.results[0];
    assert_eq!(summary.workflow_id, wf.id);
    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].status, ActionStatus::Success);

    let notifications = h.store.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].1.message, "Contrato c1");
    assert_eq!(
        summary.results[0].result,
        Some(json!({ "notificationId": notifications[0].0 }))
    );

    let stored = h.store.get_execution(summary.execution_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Success);
    assert_eq!(stored.trigger_data, json!({ "id": "c1" }));
    assert_eq!(stored.results, summary.results);
}

#[tokio::test]
async fn mismatched_event_type_creates_no_execution() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(scope, "pagos", on_event("pago.recibido", vec![]))
        .with_action(ActionType::Notify, notify("x"), vec![]);
    h.store.insert_workflow(wf).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "contrato.creado", json!({})))
        .await
        .unwrap();

    assert_eq!(report.executed_count, 0);
    assert!(report.results.is_empty());
    assert_eq!(h.store.execution_count().await, 0);
    assert!(h.store.notifications().await.is_empty());
}

#[tokio::test]
async fn trigger_conditions_gate_the_webhook() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(
        scope,
        "pagos grandes",
        on_event(
            "pago.recibido",
            vec![FactCondition::new("monto", "greaterThan", json!(1000))],
        ),
    )
    .with_action(ActionType::Webhook, json!({ "url": "https://erp.example.com/pagos" }), vec![]);
    h.store.insert_workflow(wf).await;

    let small = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "pago.recibido", json!({ "monto": 500 })))
        .await
        .unwrap();
    assert_eq!(small.executed_count, 0);
    assert_eq!(h.store.execution_count().await, 0);

    let big = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "pago.recibido", json!({ "monto": 1500 })))
        .await
        .unwrap();
    assert_eq!(big.executed_count, 1);
    let outcome = &big.results[0].results[0];
    assert_eq!(outcome.status, ActionStatus::Success);
    assert_eq!(outcome.result.as_ref().unwrap()["status"], 200);
}

#[tokio::test]
async fn failing_action_does_not_stop_the_run() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(scope, "isolation", on_event("incidente.creado", vec![]))
        .with_action(ActionType::Notify, notify("primero"), vec![])
        .with_action(ActionType::Notify, json!({ "title": "sin mensaje" }), vec![])
        .with_action(ActionType::CreateTask, json!({ "title": "Revisar {{id}}" }), vec![]);
    h.store.insert_workflow(wf).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "incidente.creado", json!({ "id": "i9" })))
        .await
        .unwrap();

    let summary = &report.results[0];
    assert_eq!(summary.status, ExecutionStatus::Success);
    let statuses: Vec<ActionStatus> = summary.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![ActionStatus::Success, ActionStatus::Error, ActionStatus::Success]
    );
    assert_eq!(summary.results[1].reason.as_deref(), Some("config_error"));
    assert!(summary.results[1].error.as_ref().unwrap().contains("message"));
    assert_eq!(h.store.tasks().await[0].1.title, "Revisar i9");
}

#[tokio::test]
async fn results_follow_action_order_not_insertion_order() {
    let h = harness();
    let scope = Uuid::new_v4();
    let mut wf = Workflow::new(scope, "ordered", on_event("contrato.creado", vec![]));
    for (order, title) in [(30, "c"), (10, "a"), (20, "b")] {
        wf.actions.push(WorkflowAction {
            id: Uuid::new_v4(),
            workflow_id: wf.id,
            action_type: ActionType::CreateTask,
            config: json!({ "title": title }),
            conditions: vec![],
            order,
        });
    }
    let expected: Vec<Uuid> = wf.ordered_actions().iter().map(|a| a.id).collect();
    h.store.insert_workflow(wf).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "contrato.creado", json!({})))
        .await
        .unwrap();

    let ids: Vec<Uuid> = report.results[0].results.iter().map(|r| r.action_id).collect();
    assert_eq!(ids, expected);
    let titles: Vec<String> = h.store.tasks().await.into_iter().map(|(_, t)| t.title).collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn skipped_action_has_no_side_effect() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(scope, "skip", on_event("pago.recibido", vec![]))
        .with_action(
            ActionType::Notify,
            notify("solo en mora"),
            vec![FactCondition::new("estado", "equal", json!("moroso"))],
        )
        .with_action(ActionType::RunScript, json!({ "scriptBody": "1" }), vec![]);
    h.store.insert_workflow(wf).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "pago.recibido", json!({ "estado": "al_dia" })))
        .await
        .unwrap();

    let results = &report.results[0].results;
    assert_eq!(results[0].status, ActionStatus::Skipped);
    assert_eq!(results[0].reason.as_deref(), Some(SKIPPED_REASON));
    assert_eq!(results[1].status, ActionStatus::Success);
    assert!(h.store.notifications().await.is_empty());
    assert_eq!(h.scripts.call_count(), 1);
}

#[tokio::test]
async fn repeated_dispatch_matches_the_same_workflows() {
    let h = harness();
    let scope = Uuid::new_v4();
    for name in ["uno", "dos"] {
        let wf = Workflow::new(scope, name, on_event("contrato.creado", vec![]))
            .with_action(ActionType::Notify, notify(name), vec![]);
        h.store.insert_workflow(wf).await;
    }
    let event = TriggerEvent::new(scope, "contrato.creado", json!({ "id": "c1" }));

    let first = h.orchestrator.dispatch_event(event.clone()).await.unwrap();
    let second = h.orchestrator.dispatch_event(event).await.unwrap();

    let ids = |r: &crate::DispatchReport| {
        let mut ids: Vec<Uuid> = r.results.iter().map(|s| s.workflow_id).collect();
        ids.sort();
        ids
    };
    assert_eq!(first.executed_count, 2);
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(h.store.execution_count().await, 4);
}

#[tokio::test]
async fn single_worker_still_runs_every_match() {
    let h = harness_with(
        Arc::new(MockHttpClient::responding(200, "")),
        OrchestratorConfig { max_concurrency: 1, ..OrchestratorConfig::default() },
    );
    let scope = Uuid::new_v4();
    for i in 0..5 {
        let wf = Workflow::new(scope, format!("wf-{i}"), on_event("tick", vec![]))
            .with_action(ActionType::CreateTask, json!({ "title": "t" }), vec![]);
        h.store.insert_workflow(wf).await;
    }

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "tick", json!({})))
        .await
        .unwrap();

    assert_eq!(report.executed_count, 5);
    assert_eq!(report.succeeded_count, 5);
    assert_eq!(h.store.tasks().await.len(), 5);
}

// ============================================================
// Bookkeeping failures, deadlines and cancellation
// ============================================================

#[tokio::test]
async fn append_failure_fails_the_run() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(scope, "store down", on_event("contrato.creado", vec![]))
        .with_action(ActionType::CreateTask, json!({ "title": "a" }), vec![])
        .with_action(ActionType::CreateTask, json!({ "title": "b" }), vec![])
        .with_action(ActionType::CreateTask, json!({ "title": "c" }), vec![]);
    h.store.insert_workflow(wf.clone()).await;
    h.store.fail_appends_after(1);

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "contrato.creado", json!({})))
        .await
        .unwrap();

    assert_eq!(report.executed_count, 1);
    assert_eq!(report.succeeded_count, 0);
    let summary = &report.results[0];
    assert_eq!(summary.status, ExecutionStatus::Failed);
    assert!(summary.error.is_some());
    assert_eq!(summary.results.len(), 1);

    let stored = h.store.executions_for(wf.id).await;
    assert_eq!(stored[0].status, ExecutionStatus::Failed);
    assert_eq!(stored[0].results.len(), 1);
    assert_eq!(stored[0].error, summary.error);
}

#[tokio::test]
async fn start_failure_is_reported_and_siblings_still_run() {
    let h = harness();
    let scope = Uuid::new_v4();
    let refused = Workflow::new(scope, "sin registro", on_event("contrato.creado", vec![]))
        .with_action(ActionType::CreateTask, json!({ "title": "nunca" }), vec![]);
    let sibling = Workflow::new(scope, "hermano", on_event("contrato.creado", vec![]))
        .with_action(ActionType::CreateTask, json!({ "title": "si" }), vec![]);
    h.store.insert_workflow(refused.clone()).await;
    h.store.insert_workflow(sibling.clone()).await;
    h.store.fail_starts_for(refused.id).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "contrato.creado", json!({})))
        .await
        .unwrap();

    assert_eq!(report.executed_count, 1);
    assert_eq!(report.succeeded_count, 1);
    assert_eq!(report.results[0].workflow_id, sibling.id);
    assert_eq!(report.workflow_errors.len(), 1);
    assert_eq!(report.workflow_errors[0].workflow_id, refused.id);
    assert!(report.workflow_errors[0].message.contains("failed to start execution"));

    let tasks = h.store.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].1.title, "si");
    assert!(h.store.executions_for(refused.id).await.is_empty());
}

#[tokio::test]
async fn finish_failure_is_reported_as_a_workflow_error() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(scope, "sin cierre", on_event("contrato.creado", vec![]))
        .with_action(ActionType::CreateTask, json!({ "title": "a" }), vec![]);
    h.store.insert_workflow(wf.clone()).await;
    h.store.fail_finishes_for(wf.id).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "contrato.creado", json!({})))
        .await
        .unwrap();

    assert_eq!(report.executed_count, 0);
    assert!(report.results.is_empty());
    assert_eq!(report.workflow_errors.len(), 1);
    assert_eq!(report.workflow_errors[0].workflow_id, wf.id);
    assert!(report.workflow_errors[0].message.contains("failed to finish execution"));

    let stored = h.store.executions_for(wf.id).await;
    assert_eq!(stored[0].status, ExecutionStatus::Running);
    assert_eq!(stored[0].results.len(), 1);
}

#[tokio::test]
async fn targeted_run_surfaces_start_failure() {
    let h = harness();
    let wf = Workflow::new(Uuid::new_v4(), "manual", Trigger::Manual(EventTrigger::default()))
        .with_action(ActionType::Notify, notify("x"), vec![]);
    h.store.insert_workflow(wf.clone()).await;
    h.store.fail_starts_for(wf.id).await;

    let err = h.orchestrator.run_workflow(wf.id, json!({})).await.unwrap_err();

    assert!(matches!(err, EngineError::Recorder(RecorderError::Start { workflow_id, .. }) if workflow_id == wf.id));
    assert!(h.store.notifications().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_action_is_recorded_as_timeout() {
    let h = harness_with(
        Arc::new(SlowHttpClient { delay: Duration::from_secs(60) }),
        OrchestratorConfig { action_timeout: Duration::from_secs(1), ..OrchestratorConfig::default() },
    );
    let scope = Uuid::new_v4();
    let wf = Workflow::new(scope, "slow", on_event("pago.recibido", vec![]))
        .with_action(ActionType::Webhook, json!({ "url": "https://slow.example.com" }), vec![])
        .with_action(ActionType::CreateTask, json!({ "title": "after" }), vec![]);
    h.store.insert_workflow(wf).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "pago.recibido", json!({})))
        .await
        .unwrap();

    let summary = &report.results[0];
    assert_eq!(summary.status, ExecutionStatus::Success);
    assert_eq!(summary.results[0].status, ActionStatus::Error);
    assert_eq!(summary.results[0].reason.as_deref(), Some("timeout"));
    assert_eq!(summary.results[1].status, ActionStatus::Success);
}

#[tokio::test]
async fn cancelled_dispatch_records_cancelled_actions() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(scope, "cancel", on_event("contrato.creado", vec![]))
        .with_action(ActionType::CreateTask, json!({ "title": "a" }), vec![]);
    h.store.insert_workflow(wf).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = h
        .orchestrator
        .dispatch_event_cancellable(TriggerEvent::new(scope, "contrato.creado", json!({})), cancel)
        .await
        .unwrap();

    let outcome = &report.results[0].results[0];
    assert_eq!(outcome.status, ActionStatus::Error);
    assert_eq!(outcome.reason.as_deref(), Some("cancelled"));
    assert!(h.store.tasks().await.is_empty());
}

// ============================================================
// Targeted runs
// ============================================================

#[tokio::test]
async fn inactive_workflow_is_rejected_without_record() {
    let h = harness();
    let mut wf = Workflow::new(Uuid::new_v4(), "off", Trigger::Manual(EventTrigger::default()))
        .with_action(ActionType::Notify, notify("x"), vec![]);
    wf.is_active = false;
    h.store.insert_workflow(wf.clone()).await;

    let err = h.orchestrator.run_workflow(wf.id, json!({})).await.unwrap_err();

    assert!(matches!(err, EngineError::WorkflowInactive(id) if id == wf.id));
    assert_eq!(h.store.execution_count().await, 0);
}

#[tokio::test]
async fn paused_and_unknown_workflows_are_rejected() {
    let h = harness();
    let mut paused = Workflow::new(Uuid::new_v4(), "paused", Trigger::Manual(EventTrigger::default()));
    paused.status = WorkflowStatus::Paused;
    h.store.insert_workflow(paused.clone()).await;

    assert!(matches!(
        h.orchestrator.run_workflow(paused.id, json!({})).await,
        Err(EngineError::WorkflowInactive(_))
    ));
    let missing = Uuid::new_v4();
    assert!(matches!(
        h.orchestrator.run_workflow(missing, json!({})).await,
        Err(EngineError::WorkflowNotFound(id)) if id == missing
    ));
    assert_eq!(h.store.execution_count().await, 0);
}

#[tokio::test]
async fn targeted_run_checks_trigger_conditions() {
    let h = harness();
    let wf = Workflow::new(
        Uuid::new_v4(),
        "manual with guard",
        Trigger::Manual(EventTrigger {
            event_type: None,
            conditions: vec![FactCondition::new("confirmado", "equal", json!(true))],
        }),
    )
    .with_action(ActionType::RunScript, json!({ "scriptBody": "context.eventType" }), vec![]);
    h.store.insert_workflow(wf.clone()).await;

    assert!(matches!(
        h.orchestrator.run_workflow(wf.id, json!({ "confirmado": false })).await,
        Err(EngineError::ConditionsNotMet(_))
    ));
    assert_eq!(h.store.execution_count().await, 0);

    let summary = h
        .orchestrator
        .run_workflow(wf.id, json!({ "confirmado": true }))
        .await
        .unwrap();
    assert_eq!(summary.status, ExecutionStatus::Success);
    let calls = h.scripts.calls.lock().unwrap().clone();
    assert_eq!(calls[0].1["context"]["eventType"], "manual");
}

#[tokio::test]
async fn scheduled_workflow_runs_by_id_but_not_by_dispatch() {
    let h = harness();
    let scope = Uuid::new_v4();
    let wf = Workflow::new(
        scope,
        "nightly",
        Trigger::Scheduled(db::models::ScheduleTrigger {
            cron_expr: Some("0 3 * * *".into()),
            frequency: None,
        }),
    )
    .with_action(ActionType::CreateTask, json!({ "title": "cierre" }), vec![]);
    h.store.insert_workflow(wf.clone()).await;

    let report = h
        .orchestrator
        .dispatch_event(TriggerEvent::new(scope, "scheduler.tick", json!({})))
        .await
        .unwrap();
    assert_eq!(report.executed_count, 0);

    let summary = h.orchestrator.run_workflow(wf.id, json!({})).await.unwrap();
    assert_eq!(summary.results[0].status, ActionStatus::Success);
    assert_eq!(h.store.tasks().await.len(), 1);
}
