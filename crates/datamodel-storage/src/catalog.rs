//! The fixed set of system tables and their creation statements.
//!
//! [`SystemTable`] is closed: adding a table means adding a variant here and
//! bumping the application version so [`crate::schema::ensure_schema`]
//! re-issues the creation set. Each table's column layout comes from its
//! [`TableLayout`], which can render the statement for any physical name.

use std::fmt;

/// A column layout shared by one or more system tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableLayout {
    Uploads,
    Forms,
    ColumnDefinitions,
    KeyValueStore,
    TableDefinitions,
    SyncETags,
}

impl TableLayout {
    /// The complete `CREATE TABLE IF NOT EXISTS` statement for `table_name`.
    pub fn create_sql(self, table_name: &str) -> String {
        let columns = match self {
            TableLayout::Uploads => {
                "_id INTEGER PRIMARY KEY,
    data_table_id TEXT NOT NULL,
    data_table_instance_id TEXT NOT NULL,
    submission_instance_id TEXT,
    display_name TEXT,
    display_subtext TEXT,
    xml_publish_status TEXT,
    last_status_change_date INTEGER NOT NULL DEFAULT 0"
            }
            TableLayout::Forms => {
                "_id INTEGER PRIMARY KEY,
    table_id TEXT NOT NULL,
    form_id TEXT NOT NULL,
    form_version TEXT,
    display_name TEXT NOT NULL,
    description TEXT,
    form_path TEXT NOT NULL,
    form_file_length INTEGER,
    form_file_modified INTEGER,
    locale TEXT,
    UNIQUE (table_id, form_id)"
            }
            TableLayout::ColumnDefinitions => {
                "table_id TEXT NOT NULL,
    element_key TEXT NOT NULL,
    element_name TEXT NOT NULL,
    element_type TEXT NOT NULL,
    is_persisted INTEGER NOT NULL DEFAULT 0,
    list_child_element_keys TEXT,
    joins TEXT,
    PRIMARY KEY (table_id, element_key)"
            }
            TableLayout::KeyValueStore => {
                "table_id TEXT NOT NULL,
    \"partition\" TEXT NOT NULL,
    aspect TEXT NOT NULL,
    \"key\" TEXT NOT NULL,
    \"type\" TEXT NOT NULL,
    \"value\" TEXT NOT NULL,
    PRIMARY KEY (table_id, \"partition\", aspect, \"key\")"
            }
            TableLayout::TableDefinitions => {
                "table_id TEXT PRIMARY KEY NOT NULL,
    db_table_name TEXT NOT NULL UNIQUE,
    sync_tag TEXT,
    last_sync_time INTEGER NOT NULL DEFAULT -1,
    sync_state TEXT NOT NULL DEFAULT 'rest',
    transactioning INTEGER NOT NULL DEFAULT 0"
            }
            TableLayout::SyncETags => {
                "_id INTEGER PRIMARY KEY,
    table_id TEXT,
    is_manifest INTEGER NOT NULL DEFAULT 0,
    url TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    etag_md5_hash TEXT NOT NULL"
            }
        };
        format!("CREATE TABLE IF NOT EXISTS \"{table_name}\" (\n    {columns}\n)")
    }
}

/// The system tables every logical database carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemTable {
    Uploads,
    Forms,
    ColumnDefinitions,
    KeyValueStoreDefault,
    KeyValueStoreActive,
    KeyValueStoreServer,
    KeyValueStoreSync,
    TableDefinitions,
    SyncETags,
}

impl SystemTable {
    /// Every system table, in creation order.
    pub const ALL: [SystemTable; 9] = [
        SystemTable::Uploads,
        SystemTable::Forms,
        SystemTable::ColumnDefinitions,
        SystemTable::KeyValueStoreDefault,
        SystemTable::KeyValueStoreActive,
        SystemTable::KeyValueStoreServer,
        SystemTable::KeyValueStoreSync,
        SystemTable::TableDefinitions,
        SystemTable::SyncETags,
    ];

    /// Physical table name.
    pub fn name(self) -> &'static str {
        match self {
            SystemTable::Uploads => "_uploads",
            SystemTable::Forms => "_form_defs",
            SystemTable::ColumnDefinitions => "_column_definitions",
            SystemTable::KeyValueStoreDefault => "_key_value_store_default",
            SystemTable::KeyValueStoreActive => "_key_value_store_active",
            SystemTable::KeyValueStoreServer => "_key_value_store_server",
            SystemTable::KeyValueStoreSync => "_key_value_store_sync",
            SystemTable::TableDefinitions => "_table_definitions",
            SystemTable::SyncETags => "_sync_etags",
        }
    }

    pub fn layout(self) -> TableLayout {
        match self {
            SystemTable::Uploads => TableLayout::Uploads,
            SystemTable::Forms => TableLayout::Forms,
            SystemTable::ColumnDefinitions => TableLayout::ColumnDefinitions,
            SystemTable::KeyValueStoreDefault
            | SystemTable::KeyValueStoreActive
            | SystemTable::KeyValueStoreServer
            | SystemTable::KeyValueStoreSync => TableLayout::KeyValueStore,
            SystemTable::TableDefinitions => TableLayout::TableDefinitions,
            SystemTable::SyncETags => TableLayout::SyncETags,
        }
    }

    pub fn create_sql(self) -> String {
        self.layout().create_sql(self.name())
    }

    /// Looks up a system table by physical name.
    pub fn from_name(name: &str) -> Option<SystemTable> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for SystemTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = SystemTable::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), SystemTable::ALL.len());
    }

    #[test]
    fn from_name_finds_every_table() {
        for table in SystemTable::ALL {
            assert_eq!(SystemTable::from_name(table.name()), Some(table));
        }
        assert_eq!(SystemTable::from_name("households"), None);
    }

    #[test]
    fn key_value_stores_share_a_layout() {
        assert_eq!(
            SystemTable::KeyValueStoreActive.layout(),
            SystemTable::KeyValueStoreSync.layout()
        );
        let sql = SystemTable::KeyValueStoreServer.create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"_key_value_store_server\""));
    }

    #[test]
    fn layout_renders_any_table_name() {
        let sql = TableLayout::KeyValueStore.create_sql("_key_value_store_staging");
        assert!(sql.contains("\"_key_value_store_staging\""));
        assert!(sql.contains(r#"PRIMARY KEY (table_id, "partition", aspect, "key")"#));
    }

    #[test]
    fn every_statement_is_valid_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for table in SystemTable::ALL {
            conn.execute_batch(&table.create_sql()).unwrap();
            // IF NOT EXISTS makes re-issuing harmless.
            conn.execute_batch(&table.create_sql()).unwrap();
        }
    }
}
