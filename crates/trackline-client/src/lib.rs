//! Trackline tracking client.
//!
//! The public entry point for host applications: configure with
//! [`ClientConfig`], construct a [`TracklineClient`], and call its
//! tracking methods. Everything queues durably in SQLite and delivers in
//! the background with retry, backoff, and ordering handled by the
//! `trackline-queue` and `trackline-delivery` crates.
//!
//! ```ignore
//! let config = ClientConfig::new("site-id", "api-key");
//! let client = TracklineClient::new(config).await?;
//!
//! client.identify("alice", json!({"plan": "pro"})).await;
//! client.track("purchase", json!({"total": 19.99})).await;
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;

pub use client::TracklineClient;
pub use config::{ClientConfig, Region};
pub use dispatch::ApiTaskRunner;
pub use error::{ClientError, ClientResult};
pub use logging::init_logging;

// Re-export the types host applications hand to or get back from the
// client, so a single dependency is enough.
pub use trackline_delivery::{EventKind, MetricKind};
pub use trackline_queue::{PassSummary, Queue, QueueConfig, QueueStatus};
