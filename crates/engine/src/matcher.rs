//! Trigger matcher: which workflows react to an event.

use std::sync::Arc;

use db::models::Workflow;
use db::{DbError, WorkflowStore};
use tracing::{debug, instrument};

use crate::conditions;
use crate::models::TriggerEvent;

#[derive(Clone)]
pub struct TriggerMatcher {
    store: Arc<dyn WorkflowStore>,
}

impl TriggerMatcher {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Active `event`/`manual` workflows of the scope whose event type
    /// (when set) equals the incoming one.
    pub async fn find_candidates(&self, event: &TriggerEvent) -> Result<Vec<Workflow>, DbError> {
        let workflows = self.store.list_triggerable(event.scope_id).await?;
        Ok(workflows
            .into_iter()
            .filter(|wf| accepts_event_type(wf, &event.event_type))
            .collect())
    }

    /// Candidates whose workflow-level conditions also hold for the event data.
    #[instrument(skip(self, event), fields(scope_id = %event.scope_id, event_type = %event.event_type))]
    pub async fn find_matches(&self, event: &TriggerEvent) -> Result<Vec<Workflow>, DbError> {
        let candidates = self.find_candidates(event).await?;
        let total = candidates.len();
        let matched: Vec<Workflow> = candidates
            .into_iter()
            .filter(|wf| conditions::evaluate(wf.trigger.conditions(), &event.data))
            .collect();
        debug!(candidates = total, matched = matched.len(), "trigger matching done");
        Ok(matched)
    }
}

fn accepts_event_type(workflow: &Workflow, event_type: &str) -> bool {
    match workflow.trigger.event_filter() {
        Some(filter) => filter
            .event_type
            .as_deref()
            .map_or(true, |expected| expected == event_type),
        None => false,
    }
}
