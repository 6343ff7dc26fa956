//! Durable background task queue for the trackline SDK.
//!
//! Tasks are persisted to SQLite the moment they are queued and removed
//! only after the server accepts them. A pass over the queue runs when
//! enough tasks pile up or a debounce timer fires, delivering tasks one
//! at a time in creation order while honoring group dependencies
//! (profile before its events, device before its metrics).

pub mod error;
pub mod pass;
pub mod queue;
pub mod resolver;
pub mod runner;
pub mod storage;
pub mod timer;

pub use error::{QueueError, QueueResult};
pub use pass::{PassRunner, PassSummary};
pub use queue::{CleanupReport, Queue, QueueConfig, QueueStatus};
pub use resolver::TaskResolver;
pub use runner::TaskRunner;
pub use storage::{CreatedTask, QueueStorage};
pub use timer::DebounceTimer;
