//! Database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::DatabaseResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_queue_tables(conn)?;
    }
    if current_version < 2 {
        migrate_v2_expiry_index(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: task record store plus the ordered inventory.
fn migrate_v1_queue_tables(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: queue tables");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS queue_task_records (
            id TEXT PRIMARY KEY,
            task_type TEXT NOT NULL,
            data TEXT NOT NULL,
            total_runs INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS queue_task_inventory (
            position INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL UNIQUE REFERENCES queue_task_records(id) ON DELETE CASCADE,
            task_type TEXT NOT NULL,
            group_start TEXT,
            group_member TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_queue_inventory_group_start
            ON queue_task_inventory(group_start);
        ",
    )?;

    record_migration(conn, 1, "queue_tables")
}

/// V2: index for expired-task cleanup scans.
fn migrate_v2_expiry_index(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v2: expiry index");

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_queue_inventory_created_at
            ON queue_task_inventory(created_at);
        ",
    )?;

    record_migration(conn, 2, "expiry_index")
}
