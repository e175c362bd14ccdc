//! Explicit registry of open logical databases.
//!
//! [`DatabaseRegistry`] maps a logical database name to one open
//! [`Database`], each behind its own mutex. Every operation on a database,
//! schema migration included, runs under that mutex, so builds never
//! observe a half-applied creation set. Different logical databases map to
//! different files and never contend with each other.
//!
//! There is no process-wide instance: callers create a registry, pass it
//! where it is needed, and close databases explicitly.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::database::Database;
use crate::error::StorageError;
use crate::types::SchemaOutcome;

/// A shared, lockable handle to an open logical database.
pub type DatabaseHandle = Arc<Mutex<Database>>;

/// Where database files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// One `<name>.sqlite` file per logical database under this directory.
    Directory(PathBuf),
    /// Every logical database is a private in-memory database.
    InMemory,
}

/// Registry of open logical databases for one application.
pub struct DatabaseRegistry {
    location: Location,
    app_key: String,
    app_version: i64,
    handles: DashMap<String, DatabaseHandle>,
}

impl DatabaseRegistry {
    /// Creates a registry storing database files under `root`.
    ///
    /// Every database opened through it is brought to `app_version` of
    /// `app_key` on open.
    pub fn new(root: impl Into<PathBuf>, app_key: &str, app_version: i64) -> Self {
        Self::with_location(Location::Directory(root.into()), app_key, app_version)
    }

    /// Creates a registry whose databases live in memory (for testing).
    pub fn in_memory(app_key: &str, app_version: i64) -> Self {
        Self::with_location(Location::InMemory, app_key, app_version)
    }

    fn with_location(location: Location, app_key: &str, app_version: i64) -> Self {
        DatabaseRegistry {
            location,
            app_key: app_key.to_string(),
            app_version,
            handles: DashMap::new(),
        }
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn app_version(&self) -> i64 {
        self.app_version
    }

    /// File backing logical database `name`, or `None` for in-memory
    /// registries.
    pub fn path_for(&self, name: &str) -> Result<Option<PathBuf>, StorageError> {
        validate_name(name)?;
        Ok(match &self.location {
            Location::Directory(root) => Some(root.join(format!("{name}.sqlite"))),
            Location::InMemory => None,
        })
    }

    /// Returns the handle for `name`, opening the database and running
    /// `ensure_schema` if it is not open yet.
    ///
    /// Concurrent first opens of the same name are serialized: exactly one
    /// caller connects and migrates, the others receive its handle.
    pub fn open(&self, name: &str) -> Result<DatabaseHandle, StorageError> {
        self.open_at(name, self.app_version).map(|(handle, _)| handle)
    }

    /// Like [`open`](Self::open), but a database opened by this call is
    /// migrated to `target_version`. The outcome is `None` when the
    /// database was already open.
    fn open_at(
        &self,
        name: &str,
        target_version: i64,
    ) -> Result<(DatabaseHandle, Option<SchemaOutcome>), StorageError> {
        validate_name(name)?;
        if let Some(handle) = self.handles.get(name) {
            return Ok((Arc::clone(handle.value()), None));
        }

        match self.handles.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok((Arc::clone(entry.get()), None)),
            Entry::Vacant(entry) => {
                let (db, outcome) = self.connect_and_migrate(name, target_version)?;
                let handle = Arc::new(Mutex::new(db));
                entry.insert(Arc::clone(&handle));
                Ok((handle, Some(outcome)))
            }
        }
    }

    fn connect_and_migrate(
        &self,
        name: &str,
        target_version: i64,
    ) -> Result<(Database, SchemaOutcome), StorageError> {
        let mut db = self.connect(name)?;
        let outcome = db.ensure_schema(&self.app_key, target_version)?;
        tracing::info!(database = name, app_key = %self.app_key, version = target_version, "opened database");
        Ok((db, outcome))
    }

    fn connect(&self, name: &str) -> Result<Database, StorageError> {
        match &self.location {
            Location::Directory(root) => {
                std::fs::create_dir_all(root)?;
                let path = root.join(format!("{name}.sqlite"));
                Database::open(name, &path_str(&path))
            }
            Location::InMemory => Database::in_memory(name),
        }
    }

    /// Runs `f` with exclusive access to database `name`, opening it first
    /// if needed.
    pub fn with_database<T, F>(&self, name: &str, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Database) -> Result<T, StorageError>,
    {
        let handle = self.open(name)?;
        let mut db = handle.lock().map_err(|_| StorageError::LockPoisoned {
            database: name.to_string(),
        })?;
        f(&mut db)
    }

    /// Re-runs the migrator for an open (or openable) database against an
    /// explicit target version, under the database lock.
    ///
    /// A database that is not open yet is created directly at
    /// `target_version`, without passing through the registry's own version.
    pub fn ensure_schema(&self, name: &str, target_version: i64) -> Result<SchemaOutcome, StorageError> {
        let (handle, outcome) = self.open_at(name, target_version)?;
        if let Some(outcome) = outcome {
            return Ok(outcome);
        }
        let mut db = handle.lock().map_err(|_| StorageError::LockPoisoned {
            database: name.to_string(),
        })?;
        db.ensure_schema(&self.app_key, target_version)
    }

    /// Closes database `name`. Returns whether it was open.
    ///
    /// Handles already given out stay usable until dropped; the connection
    /// closes with the last one.
    pub fn close(&self, name: &str) -> bool {
        let closed = self.handles.remove(name).is_some();
        if closed {
            tracing::info!(database = name, "closed database");
        }
        closed
    }

    /// Names of the currently open databases, sorted.
    pub fn open_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Logical names become file names: ASCII letters, digits, `_` and `-` only.
fn validate_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidDatabaseName {
            name: name.to_string(),
        })
    }
}
