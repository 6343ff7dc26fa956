//! Typed queue operations over the async database handle.

use crate::QueueResult;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;
use trackline_database::{queries, AsyncDatabase, GroupKey, NewTask, TaskMetadata, TaskRecord, TaskType};
use uuid::Uuid;

/// A freshly created task together with the queue depth after insert.
#[derive(Debug, Clone)]
pub struct CreatedTask {
    pub id: String,
    pub pending_count: i64,
}

/// Persistent task store. Cloning shares the underlying database.
#[derive(Clone)]
pub struct QueueStorage {
    db: AsyncDatabase,
}

impl QueueStorage {
    pub fn new(db: AsyncDatabase) -> Self {
        Self { db }
    }

    /// Persist a new task at the back of the queue.
    ///
    /// Group keys are stored in canonical string form so scheduling can
    /// compare them without decoding payloads.
    pub async fn create(
        &self,
        task_type: TaskType,
        data: String,
        group_start: Option<GroupKey>,
        blocking_groups: Vec<GroupKey>,
    ) -> QueueResult<CreatedTask> {
        let task = NewTask {
            id: Uuid::new_v4().to_string(),
            task_type,
            data,
            group_start: group_start.map(|g| g.canonical()),
            group_member: if blocking_groups.is_empty() {
                None
            } else {
                Some(blocking_groups.iter().map(|g| g.canonical()).collect())
            },
        };

        let id = task.id.clone();
        let pending_count = self
            .db
            .call(move |conn| {
                queries::insert_task(conn, &task, Utc::now())?;
                queries::pending_count(conn)
            })
            .await?;

        debug!(task_id = %id, task_type = %task_type, pending_count, "Task persisted");
        Ok(CreatedTask { id, pending_count })
    }

    pub async fn get(&self, id: &str) -> QueueResult<Option<TaskRecord>> {
        let id = id.to_string();
        Ok(self.db.call(move |conn| queries::get_task(conn, &id)).await?)
    }

    /// Snapshot of all pending task metadata in creation order.
    pub async fn inventory(&self) -> QueueResult<Vec<TaskMetadata>> {
        Ok(self.db.call(queries::list_inventory).await?)
    }

    pub async fn pending_count(&self) -> QueueResult<i64> {
        Ok(self.db.call(queries::pending_count).await?)
    }

    /// Persist a new run count for a task. Returns false when the task
    /// no longer exists.
    pub async fn update_runs(&self, id: &str, total_runs: i64) -> QueueResult<bool> {
        let id = id.to_string();
        Ok(self
            .db
            .call(move |conn| queries::update_task_runs(conn, &id, total_runs))
            .await?)
    }

    /// Remove a task and its inventory entry. Returns false when the
    /// task was already gone.
    pub async fn delete(&self, id: &str) -> QueueResult<bool> {
        let id = id.to_string();
        Ok(self.db.call(move |conn| queries::delete_task(conn, &id)).await?)
    }

    /// Drop tasks older than `max_age` that do not open a group.
    pub async fn delete_expired(&self, max_age: Duration) -> QueueResult<usize> {
        // Ages beyond chrono's range clamp to the maximum cutoff.
        let age = chrono::Duration::from_std(max_age)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let cutoff = Utc::now() - age;
        Ok(self
            .db
            .call(move |conn| queries::delete_expired(conn, cutoff))
            .await?)
    }

    /// Drop inventory entries whose task record is missing.
    pub async fn delete_orphaned(&self) -> QueueResult<usize> {
        Ok(self.db.call(queries::delete_orphaned_inventory).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> QueueStorage {
        QueueStorage::new(AsyncDatabase::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn create_assigns_id_and_reports_depth() {
        let storage = storage().await;

        let first = storage
            .create(TaskType::TrackEvent, "{}".to_string(), None, Vec::new())
            .await
            .unwrap();
        assert_eq!(first.pending_count, 1);

        let second = storage
            .create(
                TaskType::IdentifyProfile,
                "{}".to_string(),
                Some(GroupKey::IdentifyProfile("alice".to_string())),
                Vec::new(),
            )
            .await
            .unwrap();
        assert_eq!(second.pending_count, 2);
        assert_ne!(first.id, second.id);

        let inventory = storage.inventory().await.unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(
            inventory[1].group_start.as_deref(),
            Some("identified_profile_alice")
        );
    }

    #[tokio::test]
    async fn blocking_groups_store_canonical_strings() {
        let storage = storage().await;

        let created = storage
            .create(
                TaskType::RegisterDeviceToken,
                "{}".to_string(),
                Some(GroupKey::RegisterPushToken("tok-1".to_string())),
                vec![GroupKey::IdentifyProfile("alice".to_string())],
            )
            .await
            .unwrap();

        let inventory = storage.inventory().await.unwrap();
        assert_eq!(inventory[0].id, created.id);
        assert_eq!(
            inventory[0].blocking_groups(),
            ["identified_profile_alice".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_blocking_groups_store_as_absent() {
        let storage = storage().await;
        storage
            .create(TaskType::TrackEvent, "{}".to_string(), None, Vec::new())
            .await
            .unwrap();

        let inventory = storage.inventory().await.unwrap();
        assert_eq!(inventory[0].group_member, None);
    }

    #[tokio::test]
    async fn run_counter_round_trip() {
        let storage = storage().await;
        let created = storage
            .create(TaskType::TrackEvent, "{}".to_string(), None, Vec::new())
            .await
            .unwrap();

        assert!(storage.update_runs(&created.id, 2).await.unwrap());
        let record = storage.get(&created.id).await.unwrap().unwrap();
        assert_eq!(record.run_results.total_runs, 2);

        assert!(storage.delete(&created.id).await.unwrap());
        assert!(storage.get(&created.id).await.unwrap().is_none());
        assert!(!storage.update_runs(&created.id, 3).await.unwrap());
    }
}
