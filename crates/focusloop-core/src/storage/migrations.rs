//! Database schema migrations for focusloop.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::warn;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    // Ensure schema_version table exists
    create_schema_version_table(conn)?;

    // Get current version
    let current_version = get_schema_version(conn);

    // Apply migrations sequentially
    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
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
    conn.query_row(
        "SELECT version FROM schema_version",
        [],
        |row| row.get::<_, i32>(0),
    )
    .unwrap_or_else(|e| {
        // If table doesn't exist or query fails, return 0
        if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            0
        } else {
            warn!(err = %e, "failed to read schema_version, assuming unversioned");
            0
        }
    })
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    // Delete any existing version
    conn.execute("DELETE FROM schema_version", [])?;

    // Insert new version
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;

    Ok(())
}

/// Migration v1: Initial schema (baseline).
///
/// This migration represents the original schema before any migrations were
/// tracked. It's a no-op since the tables are created by Database::migrate()
/// directly.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    // Mark as v1 (tables already exist)
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration v2: Add per-user timezone.
///
/// Early databases stored reminder times against the server clock. This adds:
/// - timezone: zone name from the fixed zone table, default Moscow
///
/// Databases created before version tracking may already carry the column, so
/// its presence is checked first.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    let has_timezone: bool = tx
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('users') WHERE name = 'timezone'",
            [],
            |row| row.get::<_, i32>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_timezone {
        tx.execute_batch(
            "ALTER TABLE users ADD COLUMN timezone TEXT NOT NULL DEFAULT 'Europe/Moscow';",
        )?;
    }

    // Mark as v2
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [2],
    )?;

    tx.commit()?;
    Ok(())
}
