//! Workflow orchestrator.
//!
//! `WorkflowOrchestrator` is the engine's entry point:
//! 1. Finds the workflows an event triggers (via [`TriggerMatcher`]).
//! 2. Runs each matched workflow on its own task, bounded by a semaphore.
//! 3. Within a workflow, runs actions strictly in ascending `order`,
//!    skipping those whose conditions do not hold.
//! 4. Records every action outcome through the [`ExecutionRecorder`].
//! 5. Contains action failures: only bookkeeping failures fail a run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actions::{ActionContext, ActionError, ActionExecutors};
use db::models::{ActionOutcome, ExecutionStatus, Workflow, WorkflowAction};
use db::{ExecutionStore, WorkflowStore};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::conditions;
use crate::matcher::TriggerMatcher;
use crate::models::{DispatchReport, ExecutionSummary, MANUAL_EVENT_TYPE, TriggerEvent, WorkflowError};
use crate::recorder::{ExecutionRecorder, RecorderError};
use crate::EngineError;

/// Recorded as the reason of actions whose conditions are false.
pub const SKIPPED_REASON: &str = "conditions not met";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of workflows run concurrently by one dispatch.
    pub max_concurrency: usize,
    /// Deadline for a single action call.
    pub action_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            action_timeout: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowOrchestrator
// ---------------------------------------------------------------------------

/// Cheap to clone; every clone shares the same store handles and executors.
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    workflows: Arc<dyn WorkflowStore>,
    matcher: TriggerMatcher,
    recorder: ExecutionRecorder,
    executors: Arc<ActionExecutors>,
    config: OrchestratorConfig,
}

impl WorkflowOrchestrator {
    /// Build an orchestrator over a single store handle.
    pub fn new<S>(store: Arc<S>, executors: ActionExecutors, config: OrchestratorConfig) -> Self
    where
        S: WorkflowStore + ExecutionStore + 'static,
    {
        let workflows: Arc<dyn WorkflowStore> = store.clone();
        let executions: Arc<dyn ExecutionStore> = store;
        Self::from_parts(workflows, executions, executors, config)
    }

    pub fn from_parts(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        executors: ActionExecutors,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            matcher: TriggerMatcher::new(Arc::clone(&workflows)),
            workflows,
            recorder: ExecutionRecorder::new(executions),
            executors: Arc::new(executors),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every workflow the event triggers and report what happened.
    ///
    /// # Errors
    /// Only a failure of the initial candidate query is an error; per-workflow
    /// problems are collected into [`DispatchReport::workflow_errors`].
    pub async fn dispatch_event(&self, event: TriggerEvent) -> Result<DispatchReport, EngineError> {
        self.dispatch_event_cancellable(event, CancellationToken::new()).await
    }

    /// Like [`Self::dispatch_event`]; once `cancel` fires, in-flight and
    /// remaining action calls are recorded as cancelled.
    #[instrument(skip(self, event, cancel), fields(scope_id = %event.scope_id, event_type = %event.event_type))]
    pub async fn dispatch_event_cancellable(
        &self,
        event: TriggerEvent,
        cancel: CancellationToken,
    ) -> Result<DispatchReport, EngineError> {
        let matched = self.matcher.find_matches(&event).await?;
        if matched.is_empty() {
            info!("no workflow matched");
            return Ok(DispatchReport::default());
        }
        info!(matched = matched.len(), "dispatching event");

        let event = Arc::new(event);
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(matched.len());

        for workflow in matched {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let this = self.clone();
            let event = Arc::clone(&event);
            let cancel = cancel.clone();
            let workflow_id = workflow.id;

            let handle = tokio::spawn(async move {
                let outcome = this
                    .execute_workflow(&workflow, &event.event_type, &event.data, &cancel)
                    .await;
                drop(permit);
                outcome
            });
            handles.push((workflow_id, handle));
        }

        let mut report = DispatchReport::default();
        for (workflow_id, handle) in handles {
            match handle.await {
                Ok(Ok(summary)) => {
                    report.executed_count += 1;
                    if summary.succeeded() {
                        report.succeeded_count += 1;
                    }
                    report.results.push(summary);
                }
                Ok(Err(e)) => {
                    report.workflow_errors.push(WorkflowError {
                        workflow_id,
                        message: e.to_string(),
                    });
                }
                Err(join_err) => {
                    error!(%workflow_id, "workflow task aborted: {join_err}");
                    report.workflow_errors.push(WorkflowError {
                        workflow_id,
                        message: format!("workflow task aborted: {join_err}"),
                    });
                }
            }
        }

        info!(
            executed = report.executed_count,
            succeeded = report.succeeded_count,
            errors = report.workflow_errors.len(),
            "dispatch finished"
        );
        Ok(report)
    }

    /// Run one workflow by id with `data` as the event payload.
    ///
    /// # Errors
    /// `WorkflowNotFound`, `WorkflowInactive` and `ConditionsNotMet` are
    /// returned before any execution record is created.
    pub async fn run_workflow(&self, workflow_id: Uuid, data: Value) -> Result<ExecutionSummary, EngineError> {
        self.run_workflow_cancellable(workflow_id, data, CancellationToken::new())
            .await
    }

    #[instrument(skip(self, data, cancel))]
    pub async fn run_workflow_cancellable(
        &self,
        workflow_id: Uuid,
        data: Value,
        cancel: CancellationToken,
    ) -> Result<ExecutionSummary, EngineError> {
        let workflow = self
            .workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;

        if !workflow.is_eligible() {
            warn!("refusing to run inactive workflow");
            return Err(EngineError::WorkflowInactive(workflow_id));
        }
        if !conditions::evaluate(workflow.trigger.conditions(), &data) {
            return Err(EngineError::ConditionsNotMet(workflow_id));
        }

        Ok(self
            .execute_workflow(&workflow, MANUAL_EVENT_TYPE, &data, &cancel)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Internal: one run of one workflow.
    // -----------------------------------------------------------------------

    #[instrument(skip_all, fields(workflow_id = %workflow.id, workflow = %workflow.name))]
    async fn execute_workflow(
        &self,
        workflow: &Workflow,
        event_type: &str,
        data: &Value,
        cancel: &CancellationToken,
    ) -> Result<ExecutionSummary, RecorderError> {
        let execution_id = self.recorder.start(workflow.id, data).await?;
        info!(%execution_id, "workflow run started");

        let ctx = ActionContext {
            scope_id: workflow.scope_id,
            workflow_id: workflow.id,
            execution_id,
            event_type: event_type.to_owned(),
            data: data.clone(),
        };

        let mut results = Vec::with_capacity(workflow.actions.len());
        for action in workflow.ordered_actions() {
            let outcome = if conditions::evaluate(&action.conditions, data) {
                self.run_action(action, &ctx, cancel).await
            } else {
                ActionOutcome::skipped(action, SKIPPED_REASON)
            };

            if let Err(e) = self.recorder.append(execution_id, &outcome).await {
                let message = e.to_string();
                error!(%execution_id, "run failed while recording results");
                self.recorder
                    .finish(execution_id, ExecutionStatus::Failed, Some(&message))
                    .await?;
                return Ok(ExecutionSummary {
                    execution_id,
                    workflow_id: workflow.id,
                    workflow_name: workflow.name.clone(),
                    status: ExecutionStatus::Failed,
                    results,
                    error: Some(message),
                });
            }
            results.push(outcome);
        }

        self.recorder
            .finish(execution_id, ExecutionStatus::Success, None)
            .await?;
        info!(%execution_id, actions = results.len(), "workflow run finished");

        Ok(ExecutionSummary {
            execution_id,
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            status: ExecutionStatus::Success,
            results,
            error: None,
        })
    }

    /// Execute one action under the per-action deadline and the caller's
    /// cancellation token.  Never fails: errors become the outcome.
    async fn run_action(
        &self,
        action: &WorkflowAction,
        ctx: &ActionContext,
        cancel: &CancellationToken,
    ) -> ActionOutcome {
        let action_type = action.action_type;
        let after = self.config.action_timeout;
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ActionError::Cancelled { action_type }),
            r = tokio::time::timeout(after, self.executors.execute(action_type, &action.config, ctx)) => {
                r.unwrap_or_else(|_| Err(ActionError::Timeout { action_type, after }))
            }
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(value) => ActionOutcome::success(action, value, duration_ms),
            Err(e) => {
                warn!(action_id = %action.id, %action_type, kind = e.kind(), "action failed: {e}");
                ActionOutcome::error(action, e.kind(), e.to_string(), duration_ms)
            }
        }
    }
}
