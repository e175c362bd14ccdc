//! Column-definition rows and tree nodes.
//!
//! A [`StoredColumnRow`] is what the storage layer reads from the column
//! definitions table: the child-key list and the joins are still JSON text.
//! [`StoredColumnRow::decode`] turns it into a [`ColumnDefinitionRow`], and
//! [`crate::tree::ColumnDefinitions::build`] links decoded rows into
//! [`ColumnDefinition`] nodes.

use serde::Deserialize;

use crate::element::{ElementType, Join};
use crate::error::MalformedSchema;

/// One column-definition row as persisted, with its JSON fields undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredColumnRow {
    pub element_key: String,
    pub element_name: String,
    pub element_type: String,
    pub is_persisted: bool,
    /// JSON array of child element keys.
    pub list_child_element_keys: Option<String>,
    /// JSON array of `{"table_id", "element_key"}` records.
    pub joins: Option<String>,
}

impl StoredColumnRow {
    /// Decodes the JSON fields. An absent or blank field decodes to an empty
    /// list; anything else must be a well-formed JSON array.
    pub fn decode(self) -> Result<ColumnDefinitionRow, MalformedSchema> {
        let children: Vec<String> = decode_field(
            &self.element_key,
            "list_child_element_keys",
            self.list_child_element_keys.as_deref(),
        )?;
        let joins: Vec<Join> = decode_field(&self.element_key, "joins", self.joins.as_deref())?;
        Ok(ColumnDefinitionRow {
            element_type: ElementType::parse(&self.element_type),
            element_key: self.element_key,
            element_name: self.element_name,
            is_persisted: self.is_persisted,
            children,
            joins,
        })
    }
}

fn decode_field<T: for<'de> Deserialize<'de>>(
    element_key: &str,
    field: &'static str,
    raw: Option<&str>,
) -> Result<Vec<T>, MalformedSchema> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(text) => serde_json::from_str(text).map_err(|source| MalformedSchema::Decode {
            element_key: element_key.to_string(),
            field,
            source,
        }),
    }
}

/// A decoded column-definition row, not yet linked to its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinitionRow {
    pub element_key: String,
    pub element_name: String,
    pub element_type: ElementType,
    pub is_persisted: bool,
    /// Child element keys, in order.
    pub children: Vec<String>,
    pub joins: Vec<Join>,
}

impl ColumnDefinitionRow {
    /// A childless row with no joins.
    pub fn new(
        element_key: impl Into<String>,
        element_name: impl Into<String>,
        element_type: impl Into<ElementType>,
        is_persisted: bool,
    ) -> Self {
        ColumnDefinitionRow {
            element_key: element_key.into(),
            element_name: element_name.into(),
            element_type: element_type.into(),
            is_persisted,
            children: Vec::new(),
            joins: Vec::new(),
        }
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_joins(mut self, joins: Vec<Join>) -> Self {
        self.joins = joins;
        self
    }

    /// Encodes the list fields back to JSON for storage. Empty lists are
    /// stored as absent.
    pub fn encode(&self) -> Result<StoredColumnRow, serde_json::Error> {
        let list_child_element_keys = if self.children.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&self.children)?)
        };
        let joins = if self.joins.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&self.joins)?)
        };
        Ok(StoredColumnRow {
            element_key: self.element_key.clone(),
            element_name: self.element_name.clone(),
            element_type: self.element_type.as_str().to_string(),
            is_persisted: self.is_persisted,
            list_child_element_keys,
            joins,
        })
    }
}

/// One node of a column-definition tree.
///
/// Nodes live in a [`crate::tree::ColumnDefinitions`] arena and refer to each
/// other by element key: `children` are owned (each child has exactly one
/// parent) while `parent` and `joins` are plain references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub element_key: String,
    pub element_name: String,
    pub element_type: ElementType,
    pub is_persisted: bool,
    pub children: Vec<String>,
    pub joins: Vec<Join>,
    /// `None` for roots.
    pub parent: Option<String>,
}

impl ColumnDefinition {
    pub(crate) fn from_row(row: ColumnDefinitionRow) -> Self {
        ColumnDefinition {
            element_key: row.element_key,
            element_name: row.element_name,
            element_type: row.element_type,
            is_persisted: row.is_persisted,
            children: row.children,
            joins: row.joins,
            parent: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
