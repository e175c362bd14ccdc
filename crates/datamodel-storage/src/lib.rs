//! SQLite storage for the form data model.
//!
//! Provides the versioned schema migrator, the table catalog and the
//! storage-backed column-definition builder on top of `datamodel-core`.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: schema version, migration outcome and catalog entry types
//! - [`catalog`]: the closed set of system tables and their DDL
//! - [`schema`]: connection setup and `ensure_schema`
//! - [`database`]: one logical database (catalog lookups, builds)
//! - [`registry`]: explicit registry of open logical databases
//! - [`hash`]: blake3 fingerprints of schema documents

pub mod catalog;
pub mod database;
pub mod error;
pub mod hash;
pub mod registry;
pub mod schema;
pub mod types;

// Re-export key types for ergonomic use.
pub use catalog::{SystemTable, TableLayout};
pub use database::Database;
pub use error::StorageError;
pub use hash::{root_fingerprints, schema_fingerprint};
pub use registry::{DatabaseHandle, DatabaseRegistry, Location};
pub use types::{SchemaOutcome, SchemaVersion, TableDefinition};
