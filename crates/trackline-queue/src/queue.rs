//! Queue orchestration: enqueue, scheduling, and pass triggering.

use crate::{DebounceTimer, PassRunner, PassSummary, QueueResult, QueueStorage, TaskRunner};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use trackline_database::{AsyncDatabase, GroupKey, TaskType};
use trackline_delivery::{
    DeletePushTokenPayload, DeliveryEventPayload, Device, EventBody, IdentifyProfilePayload,
    PushMetricPayload, RegisterDeviceTokenPayload, TrackEventPayload,
};

/// Tuning knobs for when the queue delivers.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue depth that triggers an immediate delivery pass.
    pub run_threshold: i64,
    /// Delay before a pass when the queue is below the threshold.
    pub debounce: Duration,
    /// Age at which undelivered tasks get dropped.
    pub task_expiry: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            run_threshold: 10,
            debounce: Duration::from_secs(30),
            task_expiry: Duration::from_secs(3 * 24 * 60 * 60),
        }
    }
}

/// Counts from a storage cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired: usize,
    pub orphaned: usize,
}

/// Point-in-time queue depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending_count: i64,
}

struct QueueInner {
    storage: QueueStorage,
    pass: PassRunner,
    timer: DebounceTimer,
    running: AtomicBool,
    config: QueueConfig,
}

/// Handle to the background delivery queue. Clones share state.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

impl Queue {
    pub fn new(db: AsyncDatabase, runner: Arc<dyn TaskRunner>, config: QueueConfig) -> Self {
        let storage = QueueStorage::new(db);
        let pass = PassRunner::new(storage.clone(), runner);
        Self {
            inner: Arc::new(QueueInner {
                storage,
                pass,
                timer: DebounceTimer::new(),
                running: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Reap expired and orphaned tasks. Meant to run once at startup.
    pub async fn cleanup(&self) -> QueueResult<CleanupReport> {
        let expired = self
            .inner
            .storage
            .delete_expired(self.inner.config.task_expiry)
            .await?;
        let orphaned = self.inner.storage.delete_orphaned().await?;
        if expired > 0 || orphaned > 0 {
            info!(expired, orphaned, "Cleaned up stale queue tasks");
        }
        Ok(CleanupReport { expired, orphaned })
    }

    pub async fn status(&self) -> QueueResult<QueueStatus> {
        Ok(QueueStatus {
            pending_count: self.inner.storage.pending_count().await?,
        })
    }

    /// Persist a task and schedule delivery for it.
    pub async fn add_task(
        &self,
        task_type: TaskType,
        data: String,
        group_start: Option<GroupKey>,
        blocking_groups: Vec<GroupKey>,
    ) -> QueueResult<QueueStatus> {
        let created = self
            .inner
            .storage
            .create(task_type, data, group_start, blocking_groups)
            .await?;
        self.schedule_delivery(created.pending_count);
        Ok(QueueStatus {
            pending_count: created.pending_count,
        })
    }

    fn schedule_delivery(&self, pending_count: i64) {
        if pending_count >= self.inner.config.run_threshold {
            debug!(
                pending_count,
                threshold = self.inner.config.run_threshold,
                "Queue depth reached threshold, running now"
            );
            let queue = self.clone();
            tokio::spawn(async move {
                if let Err(error) = queue.run_once().await {
                    warn!(%error, "Delivery pass failed");
                }
            });
        } else {
            let queue = self.clone();
            self.inner.timer.schedule_if_not_already(
                self.inner.config.debounce,
                async move {
                    if let Err(error) = queue.run_once().await {
                        warn!(%error, "Delivery pass failed");
                    }
                },
            );
        }
    }

    /// Run one delivery pass now.
    ///
    /// Returns `None` when a pass was already in flight; the queue never
    /// runs two at once.
    pub async fn run_once(&self) -> QueueResult<Option<PassSummary>> {
        self.inner.timer.cancel();

        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Delivery pass already in progress, skipping");
            return Ok(None);
        }

        let result = self.inner.pass.run_pass().await;
        self.inner.running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    // ===== Typed enqueue operations =====

    /// Queue a profile identify.
    ///
    /// The first identify of a profile opens that profile's group.
    /// Re-identifying as a different profile opens the new group while
    /// waiting on the old one; re-identifying as the same profile only
    /// waits.
    pub async fn queue_identify_profile(
        &self,
        new_identifier: &str,
        old_identifier: Option<&str>,
        attributes: serde_json::Value,
    ) -> QueueResult<QueueStatus> {
        let payload = IdentifyProfilePayload {
            identifier: new_identifier.to_string(),
            attributes,
        };
        let data = serde_json::to_string(&payload)?;

        let (group_start, blocking) = match old_identifier {
            None => (
                Some(GroupKey::IdentifyProfile(new_identifier.to_string())),
                Vec::new(),
            ),
            Some(old) if old != new_identifier => (
                Some(GroupKey::IdentifyProfile(new_identifier.to_string())),
                vec![GroupKey::IdentifyProfile(old.to_string())],
            ),
            Some(old) => (None, vec![GroupKey::IdentifyProfile(old.to_string())]),
        };

        self.add_task(TaskType::IdentifyProfile, data, group_start, blocking)
            .await
    }

    /// Queue an event or screen view for a profile.
    pub async fn queue_track_event(
        &self,
        identifier: &str,
        event: EventBody,
    ) -> QueueResult<QueueStatus> {
        let payload = TrackEventPayload {
            identifier: identifier.to_string(),
            event,
        };
        let data = serde_json::to_string(&payload)?;
        self.add_task(
            TaskType::TrackEvent,
            data,
            None,
            vec![GroupKey::IdentifyProfile(identifier.to_string())],
        )
        .await
    }

    /// Queue a device token registration under a profile.
    pub async fn queue_register_device(
        &self,
        identifier: &str,
        device: Device,
    ) -> QueueResult<QueueStatus> {
        let group_start = GroupKey::RegisterPushToken(device.token.clone());
        let payload = RegisterDeviceTokenPayload {
            profile_identified: identifier.to_string(),
            device,
        };
        let data = serde_json::to_string(&payload)?;
        self.add_task(
            TaskType::RegisterDeviceToken,
            data,
            Some(group_start),
            vec![GroupKey::IdentifyProfile(identifier.to_string())],
        )
        .await
    }

    /// Queue removal of a device token from a profile.
    pub async fn queue_delete_device(
        &self,
        identifier: &str,
        device_token: &str,
    ) -> QueueResult<QueueStatus> {
        let payload = DeletePushTokenPayload {
            profile_identified: identifier.to_string(),
            device_token: device_token.to_string(),
        };
        let data = serde_json::to_string(&payload)?;
        self.add_task(
            TaskType::DeletePushToken,
            data,
            None,
            vec![GroupKey::RegisterPushToken(device_token.to_string())],
        )
        .await
    }

    /// Queue a push delivery metric.
    pub async fn queue_push_metric(&self, metric: PushMetricPayload) -> QueueResult<QueueStatus> {
        let blocking = vec![GroupKey::RegisterPushToken(metric.device_token.clone())];
        let data = serde_json::to_string(&metric)?;
        self.add_task(TaskType::TrackPushMetric, data, None, blocking)
            .await
    }

    /// Queue an in-app delivery event. These carry no ordering
    /// dependencies.
    pub async fn queue_delivery_event(
        &self,
        event: DeliveryEventPayload,
    ) -> QueueResult<QueueStatus> {
        let data = serde_json::to_string(&event)?;
        self.add_task(TaskType::TrackDeliveryEvent, data, None, Vec::new())
            .await
    }
}
