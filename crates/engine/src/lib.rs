//! `engine` crate — trigger matching, condition evaluation and the workflow orchestrator.

pub mod conditions;
pub mod error;
pub mod matcher;
pub mod models;
pub mod orchestrator;
pub mod recorder;

pub use error::EngineError;
pub use matcher::TriggerMatcher;
pub use models::{DispatchReport, ExecutionSummary, TriggerEvent, WorkflowError};
pub use orchestrator::{OrchestratorConfig, WorkflowOrchestrator};
pub use recorder::{ExecutionRecorder, RecorderError};

#[cfg(test)]
mod orchestrator_tests;
