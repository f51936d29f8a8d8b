pub mod events;
pub mod executions;
pub mod workflows;
