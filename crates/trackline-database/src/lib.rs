//! SQLite persistence layer for the trackline delivery queue.
//!
//! Two tables back the queue: `queue_task_records` stores full payloads
//! and run counters, `queue_task_inventory` stores the scheduling
//! metadata in creation order. Both are accessed through a single
//! [`AsyncDatabase`] handle backed by a dedicated SQLite thread.

pub mod error;
pub mod executor;
pub mod migrations;
pub mod models;
pub mod queries;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use models::{GroupKey, NewTask, TaskMetadata, TaskRecord, TaskRunResults, TaskType};
