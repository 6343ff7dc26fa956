//! Database model types for the delivery queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of remote operation a queued task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Create or update a customer profile.
    IdentifyProfile,
    /// Deliver a tracked event or screen view for a profile.
    TrackEvent,
    /// Register a push token as a device belonging to a profile.
    RegisterDeviceToken,
    /// Remove a push token from a profile.
    DeletePushToken,
    /// Report a push delivery metric (delivered/opened/converted/clicked).
    TrackPushMetric,
    /// Report an in-app delivery event.
    TrackDeliveryEvent,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentifyProfile => "identify_profile",
            Self::TrackEvent => "track_event",
            Self::RegisterDeviceToken => "register_device_token",
            Self::DeletePushToken => "delete_push_token",
            Self::TrackPushMetric => "track_push_metric",
            Self::TrackDeliveryEvent => "track_delivery_event",
        }
    }

    /// Parse a stored task type string. Unknown strings return `None` so
    /// the caller can treat the task as structurally broken rather than
    /// silently misrouting it.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "identify_profile" => Some(Self::IdentifyProfile),
            "track_event" => Some(Self::TrackEvent),
            "register_device_token" => Some(Self::RegisterDeviceToken),
            "delete_push_token" => Some(Self::DeletePushToken),
            "track_push_metric" => Some(Self::TrackPushMetric),
            "track_delivery_event" => Some(Self::TrackDeliveryEvent),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical dependency group a task can open or wait on.
///
/// Two tasks belong to the same group iff their canonical strings are
/// equal; the canonical form is what gets persisted in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// The group opened by identifying the given profile.
    IdentifyProfile(String),
    /// The group opened by registering the given push token.
    RegisterPushToken(String),
}

impl GroupKey {
    /// Canonical string projection used for equality and storage.
    pub fn canonical(&self) -> String {
        match self {
            Self::IdentifyProfile(identifier) => format!("identified_profile_{}", identifier),
            Self::RegisterPushToken(token) => format!("registered_push_token_{}", token),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Mutable run bookkeeping attached to a task record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunResults {
    /// Number of completed delivery attempts that ended in a
    /// non-terminal failure.
    pub total_runs: i64,
}

/// The persisted unit of work: payload plus run bookkeeping.
///
/// `task_type` stays a raw string here; it is only parsed into a
/// [`TaskType`] at dispatch, so records written by a newer client never
/// fail to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub task_type: String,
    /// Serialized operation payload, opaque to the queue.
    pub data: String,
    pub run_results: TaskRunResults,
}

/// Lightweight inventory entry for a task record (1:1).
///
/// Group fields hold canonical [`GroupKey`] strings so the resolver can
/// schedule without loading payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub id: String,
    pub task_type: String,
    /// Group this task opens, if any.
    pub group_start: Option<String>,
    /// Groups this task must wait on before it may run.
    pub group_member: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl TaskMetadata {
    /// Whether this entry opens the given group.
    pub fn opens_group(&self, group: &str) -> bool {
        self.group_start.as_deref() == Some(group)
    }

    /// Groups this entry blocks on, empty when unconstrained.
    pub fn blocking_groups(&self) -> &[String] {
        self.group_member.as_deref().unwrap_or(&[])
    }
}

/// Insert payload for a new queue task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: String,
    pub task_type: TaskType,
    pub data: String,
    pub group_start: Option<String>,
    pub group_member: Option<Vec<String>>,
}
