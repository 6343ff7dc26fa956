//! One delivery pass over the pending queue.

use crate::{QueueResult, QueueStorage, TaskResolver, TaskRunner};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use trackline_delivery::DeliveryError;

/// What a delivery pass did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassSummary {
    /// Tasks delivered and removed.
    pub delivered: usize,
    /// Tasks removed because they can never succeed.
    pub purged: usize,
    /// Tasks that failed and stay queued.
    pub failed: usize,
    /// Set when the pass stopped early instead of draining.
    pub halted_by: Option<DeliveryError>,
}

/// Drains the queue once, task by task, in dependency-aware creation
/// order.
///
/// The pending snapshot is loaded once per pass; tasks added while a
/// pass runs wait for the next one.
pub struct PassRunner {
    storage: QueueStorage,
    runner: Arc<dyn TaskRunner>,
    resolver: Mutex<TaskResolver>,
}

impl PassRunner {
    pub fn new(storage: QueueStorage, runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            storage,
            runner,
            resolver: Mutex::new(TaskResolver::new()),
        }
    }

    pub async fn run_pass(&self) -> QueueResult<PassSummary> {
        let mut resolver = self.resolver.lock().await;
        resolver.reset();

        let mut pending = self.storage.inventory().await?;
        debug!(pending = pending.len(), "Starting delivery pass");
        let mut summary = PassSummary::default();

        while let Some(next) = resolver.next_task(&pending) {
            pending.retain(|entry| entry.id != next.id);

            let record = match self.storage.get(&next.id).await? {
                Some(record) => record,
                None => {
                    warn!(task_id = %next.id, "Inventory entry has no task record");
                    resolver.deprioritize(&next);
                    summary.failed += 1;
                    continue;
                }
            };

            match self.runner.run_task(&record).await {
                Ok(()) => {
                    self.storage.delete(&record.id).await?;
                    summary.delivered += 1;
                }
                Err(error) if error.halts_pass() => {
                    info!(task_id = %record.id, %error, "Halting delivery pass");
                    summary.halted_by = Some(error);
                    break;
                }
                Err(error) if error.is_fatal() => {
                    warn!(
                        task_id = %record.id,
                        task_type = %record.task_type,
                        %error,
                        "Task will never succeed, deleting"
                    );
                    self.storage.delete(&record.id).await?;
                    summary.purged += 1;
                }
                Err(error) => {
                    debug!(
                        task_id = %record.id,
                        runs = record.run_results.total_runs + 1,
                        %error,
                        "Task failed, keeping it for a later pass"
                    );
                    let updated = self
                        .storage
                        .update_runs(&record.id, record.run_results.total_runs + 1)
                        .await?;
                    if !updated {
                        warn!(task_id = %record.id, "Task vanished while recording its failed run");
                    }
                    resolver.deprioritize(&next);
                    summary.failed += 1;
                }
            }
        }

        info!(
            delivered = summary.delivered,
            purged = summary.purged,
            failed = summary.failed,
            "Delivery pass complete"
        );
        Ok(summary)
    }
}
