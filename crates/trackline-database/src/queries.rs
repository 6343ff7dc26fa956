//! SQL queries for the queue tables.
//!
//! Free functions over `&rusqlite::Connection`, run through
//! [`AsyncDatabase::call`](crate::AsyncDatabase::call) closures. Multi-table
//! writes use `unchecked_transaction` so a task record and its inventory
//! entry commit or roll back together.

use crate::{DatabaseResult, NewTask, TaskMetadata, TaskRecord, TaskRunResults};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Parse an RFC 3339 timestamp stored as TEXT, falling back to now on
/// malformed values.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskMetadata> {
    let group_member: Option<String> = row.get(3)?;
    let group_member = match group_member {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(TaskMetadata {
        id: row.get(0)?,
        task_type: row.get(1)?,
        group_start: row.get(2)?,
        group_member,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

/// Insert a task record together with its inventory entry.
pub fn insert_task(conn: &Connection, task: &NewTask, created_at: DateTime<Utc>) -> DatabaseResult<()> {
    let group_member_json = task
        .group_member
        .as_ref()
        .map(|groups| serde_json::to_string(groups))
        .transpose()?;

    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO queue_task_records (id, task_type, data, total_runs)
         VALUES (?1, ?2, ?3, 0)",
        params![task.id, task.task_type.as_str(), task.data],
    )?;

    tx.execute(
        "INSERT INTO queue_task_inventory (task_id, task_type, group_start, group_member, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            task.id,
            task.task_type.as_str(),
            task.group_start,
            group_member_json,
            created_at.to_rfc3339(),
        ],
    )?;

    tx.commit()?;
    Ok(())
}

/// Load a task record by id.
pub fn get_task(conn: &Connection, id: &str) -> DatabaseResult<Option<TaskRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, task_type, data, total_runs FROM queue_task_records WHERE id = ?1",
    )?;

    let record = stmt
        .query_row(params![id], |row| {
            Ok(TaskRecord {
                id: row.get(0)?,
                task_type: row.get(1)?,
                data: row.get(2)?,
                run_results: TaskRunResults {
                    total_runs: row.get(3)?,
                },
            })
        })
        .optional()?;

    Ok(record)
}

/// Overwrite a task's run counter. Returns false when no such task exists.
pub fn update_task_runs(conn: &Connection, id: &str, total_runs: i64) -> DatabaseResult<bool> {
    let mut stmt =
        conn.prepare_cached("UPDATE queue_task_records SET total_runs = ?2 WHERE id = ?1")?;
    let rows = stmt.execute(params![id, total_runs])?;
    Ok(rows > 0)
}

/// Delete a task record and its inventory entry. Returns false when the
/// task was already gone.
pub fn delete_task(conn: &Connection, id: &str) -> DatabaseResult<bool> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "DELETE FROM queue_task_inventory WHERE task_id = ?1",
        params![id],
    )?;
    let rows = tx.execute("DELETE FROM queue_task_records WHERE id = ?1", params![id])?;

    tx.commit()?;
    Ok(rows > 0)
}

/// List inventory entries in creation order.
pub fn list_inventory(conn: &Connection) -> DatabaseResult<Vec<TaskMetadata>> {
    let mut stmt = conn.prepare_cached(
        "SELECT task_id, task_type, group_start, group_member, created_at
         FROM queue_task_inventory
         ORDER BY position ASC",
    )?;

    let rows = stmt.query_map([], row_to_metadata)?;
    let mut inventory = Vec::new();
    for row in rows {
        inventory.push(row?);
    }
    Ok(inventory)
}

/// Number of tasks waiting in the queue.
pub fn pending_count(conn: &Connection) -> DatabaseResult<i64> {
    let mut stmt = conn.prepare_cached("SELECT COUNT(*) FROM queue_task_inventory")?;
    let count = stmt.query_row([], |row| row.get(0))?;
    Ok(count)
}

/// Delete tasks created before `cutoff`.
///
/// Group-opening tasks are never expired: deleting one would unblock its
/// dependents against stale server state. The cutoff compares directly
/// against the stored text; RFC 3339 UTC timestamps sort
/// chronologically.
pub fn delete_expired(conn: &Connection, cutoff: DateTime<Utc>) -> DatabaseResult<usize> {
    let cutoff = cutoff.to_rfc3339();

    let tx = conn.unchecked_transaction()?;

    let expired: Vec<String> = {
        let mut stmt = tx.prepare_cached(
            "SELECT task_id FROM queue_task_inventory
             WHERE group_start IS NULL AND created_at < ?1",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    for id in &expired {
        tx.execute(
            "DELETE FROM queue_task_inventory WHERE task_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM queue_task_records WHERE id = ?1", params![id])?;
    }
    tx.commit()?;

    Ok(expired.len())
}

/// Delete inventory entries whose task record no longer exists.
///
/// Such entries should not occur under the current schema, but older
/// databases were created without the CASCADE constraint.
pub fn delete_orphaned_inventory(conn: &Connection) -> DatabaseResult<usize> {
    let mut stmt = conn.prepare_cached(
        "DELETE FROM queue_task_inventory
         WHERE task_id NOT IN (SELECT id FROM queue_task_records)",
    )?;
    let rows = stmt.execute([])?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{migrations, DatabaseError, TaskType};
    use chrono::Duration;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn sample_task(id: &str, ty: TaskType) -> NewTask {
        NewTask {
            id: id.to_string(),
            task_type: ty,
            data: r#"{"identifier":"alice"}"#.to_string(),
            group_start: None,
            group_member: None,
        }
    }

    // ===== Record round trips =====

    #[test]
    fn insert_and_get_round_trip() {
        let conn = test_conn();
        let task = NewTask {
            id: "t1".to_string(),
            task_type: TaskType::RegisterDeviceToken,
            data: r#"{"token":"tok-1"}"#.to_string(),
            group_start: Some("registered_push_token_tok-1".to_string()),
            group_member: Some(vec!["identified_profile_alice".to_string()]),
        };
        insert_task(&conn, &task, Utc::now()).unwrap();

        let record = get_task(&conn, "t1").unwrap().unwrap();
        assert_eq!(record.id, "t1");
        assert_eq!(record.task_type, "register_device_token");
        assert_eq!(record.data, r#"{"token":"tok-1"}"#);
        assert_eq!(record.run_results.total_runs, 0);

        let inventory = list_inventory(&conn).unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(
            inventory[0].group_start.as_deref(),
            Some("registered_push_token_tok-1")
        );
        assert_eq!(
            inventory[0].blocking_groups(),
            ["identified_profile_alice".to_string()]
        );
    }

    #[test]
    fn get_missing_task_returns_none() {
        let conn = test_conn();
        assert!(get_task(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let conn = test_conn();
        insert_task(&conn, &sample_task("t1", TaskType::TrackEvent), Utc::now()).unwrap();

        let result = insert_task(&conn, &sample_task("t1", TaskType::TrackEvent), Utc::now());
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
        assert_eq!(pending_count(&conn).unwrap(), 1);
    }

    // ===== Inventory ordering =====

    #[test]
    fn inventory_preserves_creation_order() {
        let conn = test_conn();
        for id in ["a", "b", "c"] {
            insert_task(&conn, &sample_task(id, TaskType::TrackEvent), Utc::now()).unwrap();
        }

        let ids: Vec<String> = list_inventory(&conn)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    // ===== Run counter and deletion =====

    #[test]
    fn update_task_runs_persists() {
        let conn = test_conn();
        insert_task(&conn, &sample_task("t1", TaskType::TrackEvent), Utc::now()).unwrap();

        assert!(update_task_runs(&conn, "t1", 3).unwrap());
        let record = get_task(&conn, "t1").unwrap().unwrap();
        assert_eq!(record.run_results.total_runs, 3);

        assert!(!update_task_runs(&conn, "missing", 1).unwrap());
    }

    #[test]
    fn delete_task_removes_record_and_inventory() {
        let conn = test_conn();
        insert_task(&conn, &sample_task("t1", TaskType::TrackEvent), Utc::now()).unwrap();

        assert!(delete_task(&conn, "t1").unwrap());
        assert!(get_task(&conn, "t1").unwrap().is_none());
        assert!(list_inventory(&conn).unwrap().is_empty());
        assert_eq!(pending_count(&conn).unwrap(), 0);

        assert!(!delete_task(&conn, "t1").unwrap());
    }

    // ===== Expiry =====

    #[test]
    fn delete_expired_skips_group_openers() {
        let conn = test_conn();
        let stale = Utc::now() - Duration::days(4);

        let opener = NewTask {
            id: "opener".to_string(),
            task_type: TaskType::IdentifyProfile,
            data: "{}".to_string(),
            group_start: Some("identified_profile_alice".to_string()),
            group_member: None,
        };
        insert_task(&conn, &opener, stale).unwrap();
        insert_task(&conn, &sample_task("old", TaskType::TrackEvent), stale).unwrap();
        insert_task(&conn, &sample_task("fresh", TaskType::TrackEvent), Utc::now()).unwrap();

        let cutoff = Utc::now() - Duration::days(3);
        assert_eq!(delete_expired(&conn, cutoff).unwrap(), 1);

        let ids: Vec<String> = list_inventory(&conn)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["opener", "fresh"]);
        assert!(get_task(&conn, "old").unwrap().is_none());
    }

    #[test]
    fn delete_expired_honors_the_cutoff_boundary() {
        let conn = test_conn();
        let cutoff = Utc::now() - Duration::hours(1);

        insert_task(
            &conn,
            &sample_task("older", TaskType::TrackEvent),
            cutoff - Duration::seconds(5),
        )
        .unwrap();
        insert_task(
            &conn,
            &sample_task("newer", TaskType::TrackEvent),
            cutoff + Duration::seconds(5),
        )
        .unwrap();

        assert_eq!(delete_expired(&conn, cutoff).unwrap(), 1);

        let ids: Vec<String> = list_inventory(&conn)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["newer"]);
    }

    #[test]
    fn delete_orphaned_inventory_reaps_ghosts() {
        let conn = test_conn();
        insert_task(&conn, &sample_task("t1", TaskType::TrackEvent), Utc::now()).unwrap();

        // Simulate a legacy database where the record vanished without
        // cascading to the inventory.
        conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
        conn.execute("DELETE FROM queue_task_records WHERE id = 't1'", [])
            .unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        assert_eq!(pending_count(&conn).unwrap(), 1);

        assert_eq!(delete_orphaned_inventory(&conn).unwrap(), 1);
        assert!(list_inventory(&conn).unwrap().is_empty());
    }
}
