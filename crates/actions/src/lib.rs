//! `actions` crate — the side-effecting building blocks of a workflow.
//!
//! Every action kind has an [`ActionExecutor`] that consumes its typed config.
//! [`ActionExecutors`] renders and parses a stored config and dispatches it to
//! the right executor.  External collaborators (mail relay, HTTP, script
//! sandbox, document service) sit behind traits so tests can swap them out.

pub mod config;
pub mod document;
pub mod email;
pub mod error;
pub mod http;
pub mod mock;
pub mod notify;
pub mod record;
pub mod registry;
pub mod script;
pub mod task;
pub mod template;
pub mod traits;
pub mod webhook;

pub use config::ActionConfig;
pub use error::ActionError;
pub use registry::{ActionExecutors, ActionExecutorsBuilder};
pub use traits::{ActionContext, ActionExecutor};
