//! Action-level error type.

use std::time::Duration;

use db::models::ActionType;
use thiserror::Error;

/// Errors returned by an action executor.
///
/// Every variant is contained at the action boundary: the orchestrator
/// records it as that action's result and moves on to the next action.
/// - `MissingField` / `InvalidField`: the action is misconfigured.
/// - `Execution`: a downstream collaborator failed.
/// - `Timeout` / `Cancelled`: the call did not finish within its deadline.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{action_type}: missing required config field '{field}'")]
    MissingField {
        action_type: ActionType,
        field: &'static str,
    },

    #[error("{action_type}: invalid config field '{field}': {reason}")]
    InvalidField {
        action_type: ActionType,
        field: &'static str,
        reason: String,
    },

    #[error("{action_type} failed: {source:#}")]
    Execution {
        action_type: ActionType,
        #[source]
        source: anyhow::Error,
    },

    #[error("{action_type} timed out after {after:?}")]
    Timeout {
        action_type: ActionType,
        after: Duration,
    },

    #[error("{action_type} cancelled before completion")]
    Cancelled { action_type: ActionType },
}

impl ActionError {
    pub fn execution(action_type: ActionType, source: impl Into<anyhow::Error>) -> Self {
        Self::Execution {
            action_type,
            source: source.into(),
        }
    }

    /// Short class name stored alongside the message in the execution ledger.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } | Self::InvalidField { .. } => "config_error",
            Self::Execution { .. } => "execution_error",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::MissingField { .. } | Self::InvalidField { .. })
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Self::MissingField { action_type, .. }
            | Self::InvalidField { action_type, .. }
            | Self::Execution { action_type, .. }
            | Self::Timeout { action_type, .. }
            | Self::Cancelled { action_type } => *action_type,
        }
    }
}
