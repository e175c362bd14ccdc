//! Storage error types for datamodel-storage.
//!
//! [`StorageError`] covers every failure the storage layer reports. An
//! unregistered table is not among them: lookups return `Option` for that.

use thiserror::Error;

use datamodel_core::{CoreError, MalformedSchema};

use crate::catalog::SystemTable;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An SQLite call failed outside of schema migration.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A creation statement failed while initializing or upgrading a schema.
    #[error("schema initialization failed for '{database}' at table {table}: {source}")]
    Migration {
        database: String,
        table: SystemTable,
        #[source]
        source: rusqlite::Error,
    },

    /// The internal bookkeeping tables could not be set up.
    #[error("schema bootstrap failed: {0}")]
    Bootstrap(String),

    /// A table's column definitions do not form a valid forest.
    #[error("malformed schema for table '{table_id}': {source}")]
    MalformedSchema {
        table_id: String,
        #[source]
        source: MalformedSchema,
    },

    /// A column was requested that the table does not define.
    #[error("column not found: table={table_id}, element_key={element_key}")]
    ColumnNotFound { table_id: String, element_key: String },

    /// A logical database name that cannot be mapped to a file.
    #[error("invalid database name: '{name}'")]
    InvalidDatabaseName { name: String },

    /// A thread panicked while holding a database lock.
    #[error("lock poisoned for database '{database}'")]
    LockPoisoned { database: String },
}

impl StorageError {
    /// Attaches the table id to an error from the core model.
    pub fn from_core(table_id: &str, err: CoreError) -> Self {
        match err {
            CoreError::MalformedSchema(source) => StorageError::MalformedSchema {
                table_id: table_id.to_string(),
                source,
            },
            CoreError::ColumnNotFound { element_key } => StorageError::ColumnNotFound {
                table_id: table_id.to_string(),
                element_key,
            },
        }
    }

    /// True for structural problems in stored column definitions.
    pub fn is_malformed_schema(&self) -> bool {
        matches!(self, StorageError::MalformedSchema { .. })
    }

    /// True when `ensure_schema` could not apply its DDL.
    pub fn is_migration_failure(&self) -> bool {
        matches!(self, StorageError::Migration { .. } | StorageError::Bootstrap(_))
    }
}
