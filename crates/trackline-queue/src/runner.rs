//! Seam between the queue and whatever executes tasks.

use trackline_database::TaskRecord;
use trackline_delivery::DeliveryResult;

/// Executes one task against the outside world.
///
/// Implementations decode the record's payload, perform the remote
/// operation, and classify the outcome as a
/// [`DeliveryError`](trackline_delivery::DeliveryError). The queue owns
/// everything else: what ran, what got deleted, what waits for the next
/// pass.
#[async_trait::async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, task: &TaskRecord) -> DeliveryResult<()>;
}
