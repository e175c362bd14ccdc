//! Connection setup and the versioned schema migrator.
//!
//! Two layers of schema live in each database file:
//!
//! - internal bookkeeping (the `_schema_versions` table), managed with
//!   `rusqlite_migration` through SQLite's `user_version` pragma;
//! - the application's system tables, created by [`ensure_schema`] from the
//!   [`SystemTable`] catalog and keyed by `(app_key, app_version)`.
//!
//! [`ensure_schema`] does not migrate incrementally. On a fresh database or a
//! version bump it re-issues the full `CREATE TABLE IF NOT EXISTS` set, so
//! changes to the shape of an existing table are not applied. Data migration
//! across shape changes belongs to the caller.

use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::catalog::SystemTable;
use crate::error::StorageError;
use crate::types::{SchemaOutcome, SchemaVersion};

/// Bookkeeping migrations, applied in order via `user_version` tracking.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_schema_versions.sql"))])
}

/// Opens (or creates) a SQLite database at `path` with WAL mode, foreign
/// keys, and the bookkeeping tables in place.
pub fn open_database(path: &str) -> Result<Connection, StorageError> {
    let mut conn = Connection::open(path)?;
    configure_and_bootstrap(&mut conn)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database with the bookkeeping tables in place.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let mut conn = Connection::open_in_memory()?;
    configure_and_bootstrap(&mut conn)?;
    Ok(conn)
}

fn configure_and_bootstrap(conn: &mut Connection) -> Result<(), StorageError> {
    // WAL: concurrent readers alongside the single writer.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::Bootstrap(e.to_string()))?;

    Ok(())
}

/// Reads the stored version record for `app_key`, if any.
pub fn stored_version(conn: &Connection, app_key: &str) -> Result<Option<SchemaVersion>, StorageError> {
    let version = conn
        .query_row(
            "SELECT app_key, app_version FROM _schema_versions WHERE app_key = ?1",
            params![app_key],
            |row| {
                Ok(SchemaVersion {
                    app_key: row.get(0)?,
                    app_version: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(version)
}

/// Brings the system tables of `logical_db_name` up to `target_version`.
///
/// Runs the creation set when no record exists for `app_key` or the stored
/// version is older than the target. All statements and the record update
/// share one transaction: the record moves to `target_version` only if every
/// statement succeeded. A newer stored version is left alone.
///
/// Callers must hold the database's exclusive lock for the duration.
pub fn ensure_schema(
    conn: &mut Connection,
    logical_db_name: &str,
    app_key: &str,
    target_version: i64,
) -> Result<SchemaOutcome, StorageError> {
    let outcome = match stored_version(conn, app_key)? {
        None => SchemaOutcome::Created,
        Some(v) if v.app_version < target_version => SchemaOutcome::Upgraded { from: v.app_version },
        Some(v) if v.app_version == target_version => {
            tracing::debug!(database = logical_db_name, version = %v, "schema up to date");
            return Ok(SchemaOutcome::UpToDate);
        }
        Some(v) => {
            tracing::warn!(
                database = logical_db_name,
                stored = v.app_version,
                target = target_version,
                "stored schema version is newer than target; leaving schema untouched"
            );
            return Ok(SchemaOutcome::Newer { stored: v.app_version });
        }
    };

    let tx = conn.transaction()?;
    for table in SystemTable::ALL {
        tx.execute_batch(&table.create_sql())
            .map_err(|source| StorageError::Migration {
                database: logical_db_name.to_string(),
                table,
                source,
            })?;
    }
    tx.execute(
        "INSERT INTO _schema_versions (app_key, app_version, updated_at)
         VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT(app_key) DO UPDATE SET
             app_version = excluded.app_version,
             updated_at = excluded.updated_at",
        params![app_key, target_version],
    )?;
    tx.commit()?;

    tracing::info!(
        database = logical_db_name,
        app_key,
        version = target_version,
        ?outcome,
        tables = SystemTable::ALL.len(),
        "applied schema creation set"
    );
    Ok(outcome)
}

/// Names of all user tables in the database, sorted.
pub fn table_names(conn: &Connection) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}
