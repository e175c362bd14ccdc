//! Deterministic content hashing for schema documents using blake3.
//!
//! Hashes are derived state, never stored. They are stable because a
//! [`SchemaDocument`] serializes with lexicographically ordered keys, so the
//! same column forest always yields the same bytes.

use std::collections::BTreeMap;

use datamodel_core::SchemaDocument;

use crate::error::StorageError;

/// Hash of the whole document's canonical compact JSON.
pub fn schema_fingerprint(doc: &SchemaDocument) -> Result<blake3::Hash, StorageError> {
    let bytes = serde_json::to_vec(doc)?;
    Ok(blake3::hash(&bytes))
}

/// Hash of each root's document, keyed by root element name.
///
/// Lets callers tell which top-level column changed between two versions
/// of a table.
pub fn root_fingerprints(doc: &SchemaDocument) -> Result<BTreeMap<String, blake3::Hash>, StorageError> {
    let mut result = BTreeMap::new();
    for (name, node) in doc {
        let mut hasher = blake3::Hasher::new();
        hasher.update(name.as_bytes());
        // Separator keeps ("ab", "c...") distinct from ("a", "bc...").
        hasher.update(&[0]);
        hasher.update(&serde_json::to_vec(node)?);
        result.insert(name.clone(), hasher.finalize());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datamodel_core::{ColumnDefinitionRow, ColumnDefinitions};

    fn doc(persisted: bool) -> SchemaDocument {
        ColumnDefinitions::build(vec![
            ColumnDefinitionRow::new("root", "root", "object", false).with_children(["a"]),
            ColumnDefinitionRow::new("a", "a", "string", persisted),
            ColumnDefinitionRow::new("b", "b", "integer", true),
        ])
        .unwrap()
        .to_schema_document()
        .unwrap()
    }

    #[test]
    fn fingerprint_deterministic() {
        assert_eq!(schema_fingerprint(&doc(true)).unwrap(), schema_fingerprint(&doc(true)).unwrap());
    }

    #[test]
    fn fingerprint_changes_on_flag_change() {
        assert_ne!(schema_fingerprint(&doc(true)).unwrap(), schema_fingerprint(&doc(false)).unwrap());
    }

    #[test]
    fn root_fingerprints_isolate_changes() {
        let before = root_fingerprints(&doc(true)).unwrap();
        let after = root_fingerprints(&doc(false)).unwrap();
        assert_ne!(before["root"], after["root"]);
        assert_eq!(before["b"], after["b"]);
    }
}
