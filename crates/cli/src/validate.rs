//! Offline checks for a workflow definition file.

use actions::ActionConfig;
use actions::ActionError;
use actions::http::HttpMethod;
use db::models::{Trigger, Workflow};
use engine::conditions::Operator;

/// Every problem found in `workflow`; empty when it is valid.
pub fn validate_workflow(workflow: &Workflow) -> Vec<String> {
    let mut problems = Vec::new();

    match &workflow.trigger {
        Trigger::Event(filter) | Trigger::Manual(filter) => {
            for condition in &filter.conditions {
                if condition.operator.parse::<Operator>().is_err() {
                    problems.push(format!(
                        "trigger condition on '{}': unknown operator '{}'",
                        condition.fact, condition.operator
                    ));
                }
            }
        }
        Trigger::Scheduled(schedule) => {
            if !schedule.is_well_formed() {
                problems.push("scheduled trigger needs exactly one of cronExpr or frequency".into());
            }
        }
        Trigger::Webhook(hook) => {
            if hook.url.trim().is_empty() {
                problems.push("webhook trigger has an empty url".into());
            }
            if let Err(e) = hook.method.parse::<HttpMethod>() {
                problems.push(format!("webhook trigger: {e}"));
            }
        }
    }

    let mut orders: Vec<i32> = workflow.actions.iter().map(|a| a.order).collect();
    orders.sort_unstable();
    if let Some(pair) = orders.windows(2).find(|w| w[0] == w[1]) {
        problems.push(format!("duplicate action order {}", pair[0]));
    }

    for action in workflow.ordered_actions() {
        for condition in &action.conditions {
            if condition.operator.parse::<Operator>().is_err() {
                problems.push(format!(
                    "action {} ({}): unknown operator '{}'",
                    action.order, action.action_type, condition.operator
                ));
            }
        }
        if let Err(e) = ActionConfig::parse(action.action_type, &action.config) {
            if !is_templated(&e, &action.config) {
                problems.push(format!("action {}: {e}", action.order));
            }
        }
    }

    problems
}

/// Invalid values that are `{{placeholders}}` are only known at run time.
fn is_templated(error: &ActionError, config: &serde_json::Value) -> bool {
    match error {
        ActionError::InvalidField { field, .. } => config
            .get(*field)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s.contains("{{")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::{ActionType, EventTrigger, FactCondition, ScheduleTrigger};
    use serde_json::json;
    use uuid::Uuid;

    fn event_workflow() -> Workflow {
        Workflow::new(Uuid::new_v4(), "wf", Trigger::Event(EventTrigger::default()))
    }

    #[test]
    fn valid_workflow_has_no_problems() {
        let wf = event_workflow()
            .with_action(ActionType::Notify, json!({ "title": "t", "message": "m" }), vec![])
            .with_action(
                ActionType::UpdateRecord,
                json!({ "entityType": "payment", "recordId": "{{pagoId}}", "patch": { "status": "paid" } }),
                vec![FactCondition::new("monto", "greaterThan", json!(0))],
            );
        assert!(validate_workflow(&wf).is_empty(), "{:?}", validate_workflow(&wf));
    }

    #[test]
    fn duplicate_orders_are_reported() {
        let mut wf = event_workflow()
            .with_action(ActionType::CreateTask, json!({ "title": "a" }), vec![])
            .with_action(ActionType::CreateTask, json!({ "title": "b" }), vec![]);
        wf.actions[1].order = wf.actions[0].order;
        let problems = validate_workflow(&wf);
        assert_eq!(problems, vec!["duplicate action order 1".to_owned()]);
    }

    #[test]
    fn config_and_operator_problems_are_reported() {
        let wf = event_workflow().with_action(
            ActionType::Notify,
            json!({ "title": "t" }),
            vec![FactCondition::new("x", "between", json!([1, 2]))],
        );
        let problems = validate_workflow(&wf);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("unknown operator 'between'"));
        assert!(problems[1].contains("'message'"));
    }

    #[test]
    fn malformed_schedule_is_reported() {
        let wf = Workflow::new(
            Uuid::new_v4(),
            "nightly",
            Trigger::Scheduled(ScheduleTrigger {
                cron_expr: Some("0 3 * * *".into()),
                frequency: Some("daily".into()),
            }),
        );
        assert_eq!(validate_workflow(&wf).len(), 1);
    }
}
