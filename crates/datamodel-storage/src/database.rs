//! A single logical database: catalog lookups and column-definition builds.
//!
//! [`Database`] owns one SQLite connection. Reads go through cached
//! prepared statements that are released when the statement handle drops,
//! on success and error paths alike. Every write runs in a transaction.

use rusqlite::{params, Connection, OptionalExtension};

use datamodel_core::{ColumnDefinitionRow, ColumnDefinitions, SchemaDocument, StoredColumnRow};

use crate::error::StorageError;
use crate::schema;
use crate::types::{SchemaOutcome, SchemaVersion, TableDefinition};

/// An open logical database.
pub struct Database {
    name: String,
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database file at `path` for logical database
    /// `name`. System tables exist only after [`Database::ensure_schema`].
    pub fn open(name: &str, path: &str) -> Result<Self, StorageError> {
        let conn = schema::open_database(path)?;
        Ok(Database {
            name: name.to_string(),
            conn,
        })
    }

    /// Opens an in-memory database (for testing).
    pub fn in_memory(name: &str) -> Result<Self, StorageError> {
        let conn = schema::open_in_memory()?;
        Ok(Database {
            name: name.to_string(),
            conn,
        })
    }

    /// Logical database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// See [`schema::ensure_schema`].
    pub fn ensure_schema(&mut self, app_key: &str, target_version: i64) -> Result<SchemaOutcome, StorageError> {
        schema::ensure_schema(&mut self.conn, &self.name, app_key, target_version)
    }

    pub fn schema_version(&self, app_key: &str) -> Result<Option<SchemaVersion>, StorageError> {
        schema::stored_version(&self.conn, app_key)
    }

    /// Names of all tables currently in the database file.
    pub fn table_names(&self) -> Result<Vec<String>, StorageError> {
        schema::table_names(&self.conn)
    }

    // -----------------------------------------------------------------------
    // Table catalog
    // -----------------------------------------------------------------------

    /// Resolves `table_id` to its physical table name.
    ///
    /// `None` means the table is not registered yet, which is a normal
    /// condition rather than an error.
    pub fn resolve_table_name(&self, table_id: &str) -> Result<Option<String>, StorageError> {
        let name: Option<String> = self
            .conn
            .prepare_cached("SELECT db_table_name FROM _table_definitions WHERE table_id = ?1")?
            .query_row(params![table_id], |row| row.get(0))
            .optional()?;
        Ok(name)
    }

    /// All catalog entries, ordered by table id.
    pub fn list_tables(&self) -> Result<Vec<TableDefinition>, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT table_id, db_table_name FROM _table_definitions ORDER BY table_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(TableDefinition {
                table_id: row.get(0)?,
                db_table_name: row.get(1)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Registers `table_id` under `db_table_name` with the given column
    /// definitions, replacing any previous definitions for that id.
    ///
    /// The rows are linked first; a set that would not build is rejected
    /// before anything is written.
    pub fn register_table(
        &mut self,
        table_id: &str,
        db_table_name: &str,
        rows: &[ColumnDefinitionRow],
    ) -> Result<(), StorageError> {
        ColumnDefinitions::build(rows.to_vec()).map_err(|source| StorageError::MalformedSchema {
            table_id: table_id.to_string(),
            source,
        })?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO _table_definitions (table_id, db_table_name) VALUES (?1, ?2)
             ON CONFLICT(table_id) DO UPDATE SET db_table_name = excluded.db_table_name",
            params![table_id, db_table_name],
        )?;
        tx.execute(
            "DELETE FROM _column_definitions WHERE table_id = ?1",
            params![table_id],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO _column_definitions (table_id, element_key, element_name, element_type, is_persisted, list_child_element_keys, joins) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                let stored = row.encode()?;
                stmt.execute(params![
                    table_id,
                    stored.element_key,
                    stored.element_name,
                    stored.element_type,
                    stored.is_persisted,
                    stored.list_child_element_keys,
                    stored.joins,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(
            database = %self.name,
            table_id,
            db_table_name,
            columns = rows.len(),
            "registered table"
        );
        Ok(())
    }

    /// Removes a catalog entry and its column definitions. Returns whether
    /// the table was registered.
    pub fn drop_table_definition(&mut self, table_id: &str) -> Result<bool, StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM _column_definitions WHERE table_id = ?1",
            params![table_id],
        )?;
        let removed = tx.execute(
            "DELETE FROM _table_definitions WHERE table_id = ?1",
            params![table_id],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }

    // -----------------------------------------------------------------------
    // Column definitions
    // -----------------------------------------------------------------------

    /// Reads the raw column-definition rows of `table_id`, in element-key
    /// order.
    pub fn column_rows(&self, table_id: &str) -> Result<Vec<StoredColumnRow>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT element_key, element_name, element_type, is_persisted, list_child_element_keys, joins FROM _column_definitions WHERE table_id = ?1 ORDER BY element_key",
        )?;
        let rows = stmt.query_map(params![table_id], |row| {
            Ok(StoredColumnRow {
                element_key: row.get(0)?,
                element_name: row.get(1)?,
                element_type: row.get(2)?,
                is_persisted: row.get(3)?,
                list_child_element_keys: row.get(4)?,
                joins: row.get(5)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Builds the column-definition forest of `table_id` from storage.
    ///
    /// A table with no rows yields an empty forest. Any structural problem
    /// fails the whole build.
    pub fn build_column_definitions(&self, table_id: &str) -> Result<ColumnDefinitions, StorageError> {
        let rows = self.column_rows(table_id)?;
        let count = rows.len();
        let defs = ColumnDefinitions::from_stored(rows).map_err(|source| StorageError::MalformedSchema {
            table_id: table_id.to_string(),
            source,
        })?;
        tracing::debug!(database = %self.name, table_id, columns = count, "built column definitions");
        Ok(defs)
    }

    /// Builds and serializes the schema document of `table_id`.
    pub fn schema_document(&self, table_id: &str) -> Result<SchemaDocument, StorageError> {
        self.build_column_definitions(table_id)?
            .to_schema_document()
            .map_err(|e| StorageError::from_core(table_id, e))
    }

    /// Inserts a raw row without validation.
    #[cfg(test)]
    pub(crate) fn insert_raw_column(&self, table_id: &str, row: &StoredColumnRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO _column_definitions (table_id, element_key, element_name, element_type, is_persisted, list_child_element_keys, joins) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                table_id,
                row.element_key,
                row.element_name,
                row.element_type,
                row.is_persisted,
                row.list_child_element_keys,
                row.joins,
            ],
        )?;
        Ok(())
    }
}
