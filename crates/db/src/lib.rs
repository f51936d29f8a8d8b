//! `db` crate — the persistence boundary of the workflow engine.
//!
//! Provides the store traits the engine is written against, the records they
//! exchange, an in-memory implementation and a Postgres implementation.
//! No business logic lives here.

pub mod error;
pub mod models;
pub mod store;
pub mod memory;
pub mod pool;
pub mod repository;

pub use error::DbError;
pub use memory::MemoryStore;
pub use pool::DbPool;
pub use repository::PgStore;
pub use store::{EntityStore, ExecutionStore, RecordRegistry, RecordRepository, Store, WorkflowStore};
