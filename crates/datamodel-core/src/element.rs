//! Element type tags and cross-table joins.
//!
//! [`ElementType`] is decided once, when a row is read, so the serializer
//! dispatches on a closed enum instead of re-matching type strings. Type
//! names outside the built-in set are kept verbatim in
//! [`ElementType::Custom`] and are treated as object-shaped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The scalar element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Integer => "integer",
            ScalarKind::Boolean => "boolean",
        }
    }
}

/// The shape of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// A leaf value.
    Scalar(ScalarKind),
    /// A list whose single child describes its items.
    Array,
    /// A literal `object`.
    Object,
    /// Any other type name (e.g. `geopoint`, `mimeUri`). Serialized as an
    /// object that also records the original name.
    Custom(String),
}

impl ElementType {
    /// Parses a stored `element_type` string. Never fails: unknown names
    /// become [`ElementType::Custom`].
    pub fn parse(s: &str) -> Self {
        match s {
            "string" => ElementType::Scalar(ScalarKind::String),
            "number" => ElementType::Scalar(ScalarKind::Number),
            "integer" => ElementType::Scalar(ScalarKind::Integer),
            "boolean" => ElementType::Scalar(ScalarKind::Boolean),
            "array" => ElementType::Array,
            "object" => ElementType::Object,
            other => ElementType::Custom(other.to_string()),
        }
    }

    /// The type name as stored.
    pub fn as_str(&self) -> &str {
        match self {
            ElementType::Scalar(kind) => kind.as_str(),
            ElementType::Array => "array",
            ElementType::Object => "object",
            ElementType::Custom(name) => name,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ElementType::Scalar(_))
    }

    /// True for `object` and custom types, which serialize with `properties`.
    pub fn is_object_like(&self) -> bool {
        matches!(self, ElementType::Object | ElementType::Custom(_))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ElementType {
    fn from(s: &str) -> Self {
        ElementType::parse(s)
    }
}

/// A declared reference from a column to a column of another table.
///
/// Field names match the stored JSON records (`{"table_id", "element_key"}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Join {
    pub table_id: String,
    pub element_key: String,
}

impl Join {
    pub fn new(table_id: impl Into<String>, element_key: impl Into<String>) -> Self {
        Join {
            table_id: table_id.into(),
            element_key: element_key.into(),
        }
    }
}
