//! Database schema migrations for repguard.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current migration
//! version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current
/// schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            0
        } else {
            eprintln!("Warning: failed to read schema_version: {}", e);
            0
        }
    })
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: Initial schema (baseline).
///
/// The base tables are created by ContractDb::migrate() directly; this
/// just marks the version.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration v2: Delivery-tracking fields on reminders.
///
/// Adds the columns the dispatcher needs for retry bookkeeping and
/// at-most-once claims:
/// - attempts: delivery attempts made for the current occurrence
/// - failure_reason: last delivery error, required when status = failed
/// - claimed_at: in-flight claim marker
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE reminders ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE reminders ADD COLUMN failure_reason TEXT;
         ALTER TABLE reminders ADD COLUMN claimed_at TEXT;",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: Renewal audit trail on contracts.
///
/// Adds `superseded` so renewed protection windows are retained instead
/// of overwritten in place.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE contracts ADD COLUMN superseded INTEGER NOT NULL DEFAULT 0;",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()
}
