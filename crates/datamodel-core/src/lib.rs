//! Column-definition model for user-defined form tables.
//!
//! A table's columns are stored as flat rows; this crate links them into a
//! forest ([`ColumnDefinitions`]) and serializes that forest into a nested,
//! JSON-schema-like [`SchemaDocument`]. Nothing here touches storage.

pub mod column;
pub mod document;
pub mod element;
pub mod error;
pub mod tree;

// Re-export commonly used types
pub use column::{ColumnDefinition, ColumnDefinitionRow, StoredColumnRow};
pub use document::{rows_from_document, SchemaDocument, SchemaNode, ARRAY_ITEMS_NAME};
pub use element::{ElementType, Join, ScalarKind};
pub use error::{CoreError, MalformedSchema};
pub use tree::ColumnDefinitions;
