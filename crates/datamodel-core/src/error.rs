//! Core error types for datamodel-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Every
//! structural problem found while assembling or walking a column-definition
//! tree is a [`MalformedSchema`]; nothing in this crate recovers from one.

use thiserror::Error;

/// A structural violation in a table's column definitions.
#[derive(Debug, Error)]
pub enum MalformedSchema {
    /// A `list_child_element_keys` entry names a key with no row.
    #[error("column '{parent}' references missing child '{child}'")]
    MissingChild { parent: String, child: String },

    /// Two rows share the same element key.
    #[error("duplicate element key '{element_key}'")]
    DuplicateElementKey { element_key: String },

    /// Two siblings (or two roots) share the same element name.
    #[error("duplicate element name '{element_name}' under {scope}")]
    DuplicateElementName { element_name: String, scope: String },

    /// A child is listed by more than one parent.
    #[error("column '{child}' is claimed by both '{first}' and '{second}'")]
    MultipleParents {
        child: String,
        first: String,
        second: String,
    },

    /// A parent lists the same child key more than once.
    #[error("column '{parent}' lists child '{child}' more than once")]
    DuplicateChild { parent: String, child: String },

    /// A scalar column carries a child list.
    #[error("scalar column '{element_key}' cannot have children, found {children}")]
    ScalarWithChildren { element_key: String, children: usize },

    /// An `array` column without exactly one item child.
    #[error("array column '{element_key}' must have exactly one child, found {children}")]
    ArrayArity { element_key: String, children: usize },

    /// The parent/child relation loops back on itself.
    #[error("cycle detected at column '{element_key}'")]
    Cycle { element_key: String },

    /// A serialized child-key list or joins list could not be decoded.
    #[error("cannot decode {field} of column '{element_key}': {source}")]
    Decode {
        element_key: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A schema document node is missing a field or carries a bad value.
    #[error("invalid schema document at '{path}': {reason}")]
    InvalidDocument { path: String, reason: String },
}

/// Core errors produced by the datamodel-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The column definitions do not form a valid forest.
    #[error("malformed schema: {0}")]
    MalformedSchema(#[from] MalformedSchema),

    /// An element key was not present in the tree.
    #[error("column not found: '{element_key}'")]
    ColumnNotFound { element_key: String },
}
