//! Storage-layer record types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The stored `(appKey, appVersion)` pair identifying which generation of
/// creation DDL a database has received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub app_key: String,
    pub app_version: i64,
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.app_key, self.app_version)
    }
}

/// What [`crate::schema::ensure_schema`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SchemaOutcome {
    /// No version record existed; the creation set ran.
    Created,
    /// The stored version was older; the creation set was re-issued.
    Upgraded { from: i64 },
    /// The stored version already equals the target; nothing ran.
    UpToDate,
    /// The stored version is newer than the target; nothing ran.
    Newer { stored: i64 },
}

impl SchemaOutcome {
    /// True when creation DDL was executed.
    pub fn ran_ddl(self) -> bool {
        matches!(self, SchemaOutcome::Created | SchemaOutcome::Upgraded { .. })
    }
}

/// A table catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Stable application-level identifier.
    pub table_id: String,
    /// Physical storage table name.
    pub db_table_name: String,
}
