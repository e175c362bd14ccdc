//! Schema documents: the JSON-schema-like view of a column-definition tree.
//!
//! Emission rules, dispatched on [`ElementType`]:
//!
//! - scalars emit `{elementKey, isPersisted, type}`;
//! - `array` adds `items`, the document of its single child;
//! - `object` and custom types emit `type: "object"` with `properties`
//!   keyed by child element name. Custom types also record the original
//!   name under `elementType`.
//!
//! [`SchemaNode`] declares its fields in lexicographic order and nests
//! children in `BTreeMap`s, so serializing the same tree always produces
//! the same bytes.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::column::{ColumnDefinition, ColumnDefinitionRow};
use crate::element::{ElementType, ScalarKind};
use crate::error::{CoreError, MalformedSchema};
use crate::tree::ColumnDefinitions;

/// Root element name -> document of that root.
pub type SchemaDocument = BTreeMap<String, SchemaNode>;

/// The document of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    pub element_key: String,
    /// Original type name, present only for custom object-shaped types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    pub is_persisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaNode>>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ColumnDefinitions {
    /// Serializes the subtree rooted at `element_key`.
    pub fn schema_node(&self, element_key: &str) -> Result<SchemaNode, CoreError> {
        let def = self.get(element_key).ok_or_else(|| CoreError::ColumnNotFound {
            element_key: element_key.to_string(),
        })?;
        let mut visited = HashSet::new();
        Ok(self.emit(def, &mut visited)?)
    }

    /// Serializes every root, keyed by root element name.
    pub fn to_schema_document(&self) -> Result<SchemaDocument, CoreError> {
        let mut visited = HashSet::new();
        let mut doc = SchemaDocument::new();
        for root in self.roots() {
            let node = self.emit(root, &mut visited)?;
            insert_unique(&mut doc, &root.element_name, node, "table root")?;
        }
        Ok(doc)
    }

    fn emit<'a>(
        &'a self,
        def: &'a ColumnDefinition,
        visited: &mut HashSet<&'a str>,
    ) -> Result<SchemaNode, MalformedSchema> {
        if !visited.insert(def.element_key.as_str()) {
            return Err(MalformedSchema::Cycle {
                element_key: def.element_key.clone(),
            });
        }

        let mut node = SchemaNode {
            element_key: def.element_key.clone(),
            element_type: None,
            is_persisted: def.is_persisted,
            items: None,
            properties: None,
            kind: String::new(),
        };

        match &def.element_type {
            ElementType::Scalar(kind) => {
                if !def.children.is_empty() {
                    return Err(MalformedSchema::ScalarWithChildren {
                        element_key: def.element_key.clone(),
                        children: def.children.len(),
                    });
                }
                node.kind = kind.as_str().to_string();
            }
            ElementType::Array => {
                if def.children.len() != 1 {
                    return Err(MalformedSchema::ArrayArity {
                        element_key: def.element_key.clone(),
                        children: def.children.len(),
                    });
                }
                let item = self.resolve_child(def, &def.children[0])?;
                node.kind = "array".to_string();
                node.items = Some(Box::new(self.emit(item, visited)?));
            }
            ElementType::Object | ElementType::Custom(_) => {
                let scope = format!("column '{}'", def.element_key);
                let mut properties = BTreeMap::new();
                for child_key in &def.children {
                    let child = self.resolve_child(def, child_key)?;
                    let child_node = self.emit(child, visited)?;
                    insert_unique(&mut properties, &child.element_name, child_node, &scope)?;
                }
                node.kind = "object".to_string();
                if let ElementType::Custom(name) = &def.element_type {
                    node.element_type = Some(name.clone());
                }
                node.properties = Some(properties);
            }
        }
        Ok(node)
    }

    fn resolve_child(
        &self,
        parent: &ColumnDefinition,
        child_key: &str,
    ) -> Result<&ColumnDefinition, MalformedSchema> {
        self.get(child_key).ok_or_else(|| MalformedSchema::MissingChild {
            parent: parent.element_key.clone(),
            child: child_key.to_string(),
        })
    }

    /// Rebuilds a forest from a schema document.
    pub fn from_document(doc: &SchemaDocument) -> Result<Self, MalformedSchema> {
        Self::build(rows_from_document(doc)?)
    }
}

fn insert_unique(
    map: &mut BTreeMap<String, SchemaNode>,
    name: &str,
    node: SchemaNode,
    scope: &str,
) -> Result<(), MalformedSchema> {
    if map.insert(name.to_string(), node).is_some() {
        return Err(MalformedSchema::DuplicateElementName {
            element_name: name.to_string(),
            scope: scope.to_string(),
        });
    }
    Ok(())
}

/// Element name given to array item columns rebuilt from a document.
pub const ARRAY_ITEMS_NAME: &str = "items";

/// Flattens a schema document into column-definition rows, parents before
/// children.
///
/// Joins are not part of documents, so every row comes back without joins.
/// Object children are listed in element-name order.
pub fn rows_from_document(doc: &SchemaDocument) -> Result<Vec<ColumnDefinitionRow>, MalformedSchema> {
    let mut rows = Vec::new();
    for (name, node) in doc {
        flatten(name, node, name, &mut rows)?;
    }
    Ok(rows)
}

fn flatten(
    name: &str,
    node: &SchemaNode,
    path: &str,
    rows: &mut Vec<ColumnDefinitionRow>,
) -> Result<(), MalformedSchema> {
    let invalid = |reason: String| MalformedSchema::InvalidDocument {
        path: path.to_string(),
        reason,
    };

    let (element_type, children): (ElementType, Vec<(&str, &SchemaNode)>) = match node.kind.as_str() {
        "string" => (ElementType::Scalar(ScalarKind::String), Vec::new()),
        "number" => (ElementType::Scalar(ScalarKind::Number), Vec::new()),
        "integer" => (ElementType::Scalar(ScalarKind::Integer), Vec::new()),
        "boolean" => (ElementType::Scalar(ScalarKind::Boolean), Vec::new()),
        "array" => {
            let items = node
                .items
                .as_deref()
                .ok_or_else(|| invalid("array without items".to_string()))?;
            (ElementType::Array, vec![(items.element_key.as_str(), items)])
        }
        "object" => {
            let element_type = match node.element_type.as_deref() {
                None => ElementType::Object,
                Some(custom) => {
                    let ty = ElementType::parse(custom);
                    if !ty.is_object_like() {
                        return Err(invalid(format!("elementType '{custom}' is not object-shaped")));
                    }
                    ty
                }
            };
            let children = node
                .properties
                .iter()
                .flatten()
                .map(|(child_name, child)| (child_name.as_str(), child))
                .collect();
            (element_type, children)
        }
        other => return Err(invalid(format!("unknown type '{other}'"))),
    };

    // Array items have no property name in a document.
    let child_keys: Vec<String> = children.iter().map(|(_, c)| c.element_key.clone()).collect();
    rows.push(
        ColumnDefinitionRow::new(node.element_key.clone(), name, element_type.clone(), node.is_persisted)
            .with_children(child_keys),
    );

    for (child_name, child) in children {
        let child_name = if element_type == ElementType::Array {
            ARRAY_ITEMS_NAME
        } else {
            child_name
        };
        flatten(child_name, child, &format!("{path}.{child_name}"), rows)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root_and_a() -> ColumnDefinitions {
        ColumnDefinitions::build(vec![
            ColumnDefinitionRow::new("root", "root", "object", false).with_children(["a"]),
            ColumnDefinitionRow::new("a", "a", "string", true),
        ])
        .unwrap()
    }

    #[test]
    fn root_with_string_child() {
        let defs = root_and_a();
        assert_eq!(defs.len(), 2);
        let kids: Vec<_> = defs.children("root").map(|c| c.element_key.as_str()).collect();
        assert_eq!(kids, vec!["a"]);

        let doc = defs.to_schema_document().unwrap();
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "root": {
                    "type": "object",
                    "elementKey": "root",
                    "isPersisted": false,
                    "properties": {
                        "a": {"type": "string", "elementKey": "a", "isPersisted": true}
                    }
                }
            })
        );
    }

    #[test]
    fn document_bytes_are_stable() {
        let first = serde_json::to_string(&root_and_a().to_schema_document().unwrap()).unwrap();
        let second = serde_json::to_string(&root_and_a().to_schema_document().unwrap()).unwrap();
        assert_eq!(first, second);
        insta::assert_snapshot!(
            first,
            @r#"{"root":{"elementKey":"root","isPersisted":false,"properties":{"a":{"elementKey":"a","isPersisted":true,"type":"string"}},"type":"object"}}"#
        );
    }

    #[test]
    fn array_emits_items() {
        let defs = ColumnDefinitions::build(vec![
            ColumnDefinitionRow::new("scores", "scores", "array", true).with_children(["scores_item"]),
            ColumnDefinitionRow::new("scores_item", "items", "number", false),
        ])
        .unwrap();
        let node = defs.schema_node("scores").unwrap();
        assert_eq!(node.kind, "array");
        assert!(node.properties.is_none());
        let items = node.items.unwrap();
        assert_eq!(items.kind, "number");
        assert_eq!(items.element_key, "scores_item");
    }

    #[test]
    fn custom_type_keeps_original_name() {
        let defs = ColumnDefinitions::build(vec![
            ColumnDefinitionRow::new("loc", "location", "geopoint", false)
                .with_children(["loc_lat", "loc_lng"]),
            ColumnDefinitionRow::new("loc_lat", "latitude", "number", true),
            ColumnDefinitionRow::new("loc_lng", "longitude", "number", true),
        ])
        .unwrap();
        let doc = defs.to_schema_document().unwrap();
        let loc = &doc["location"];
        assert_eq!(loc.kind, "object");
        assert_eq!(loc.element_type.as_deref(), Some("geopoint"));
        let props = loc.properties.as_ref().unwrap();
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["latitude", "longitude"]);
    }

    #[test]
    fn plain_object_omits_element_type() {
        let value = serde_json::to_value(root_and_a().schema_node("root").unwrap()).unwrap();
        assert!(value.get("elementType").is_none());
    }

    #[test]
    fn empty_object_has_empty_properties() {
        let defs =
            ColumnDefinitions::build(vec![ColumnDefinitionRow::new("meta", "meta", "object", false)]).unwrap();
        let value = serde_json::to_value(defs.schema_node("meta").unwrap()).unwrap();
        assert_eq!(value["properties"], json!({}));
    }

    #[test]
    fn schema_node_unknown_key() {
        assert!(matches!(
            root_and_a().schema_node("zzz"),
            Err(CoreError::ColumnNotFound { .. })
        ));
    }

    fn raw(key: &str, ty: &str, children: &[&str], parent: Option<&str>) -> ColumnDefinition {
        ColumnDefinition {
            element_key: key.into(),
            element_name: key.into(),
            element_type: ElementType::parse(ty),
            is_persisted: false,
            children: children.iter().map(|c| c.to_string()).collect(),
            joins: Vec::new(),
            parent: parent.map(str::to_string),
        }
    }

    #[test]
    fn serializer_guards_against_cycles() {
        let defs = ColumnDefinitions::from_nodes_unchecked(vec![
            raw("root", "object", &["a"], None),
            raw("a", "object", &["root"], Some("root")),
        ]);
        assert!(matches!(
            defs.schema_node("root"),
            Err(CoreError::MalformedSchema(MalformedSchema::Cycle { .. }))
        ));
    }

    #[test]
    fn serializer_rejects_bad_array_arity() {
        let defs = ColumnDefinitions::from_nodes_unchecked(vec![raw("list", "array", &[], None)]);
        assert!(matches!(
            defs.to_schema_document(),
            Err(CoreError::MalformedSchema(MalformedSchema::ArrayArity { children: 0, .. }))
        ));
    }

    #[test]
    fn serializer_rejects_scalar_with_children() {
        let defs = ColumnDefinitions::from_nodes_unchecked(vec![
            raw("name", "string", &["first"], None),
            raw("first", "string", &[], Some("name")),
        ]);
        assert!(matches!(
            defs.schema_node("name"),
            Err(CoreError::MalformedSchema(MalformedSchema::ScalarWithChildren { children: 1, .. }))
        ));
    }

    #[test]
    fn document_converts_back_to_equivalent_forest() {
        let defs = ColumnDefinitions::build(vec![
            ColumnDefinitionRow::new("household", "household", "object", false)
                .with_children(["hh_name", "members"]),
            ColumnDefinitionRow::new("hh_name", "name", "string", true),
            ColumnDefinitionRow::new("members", "members", "array", true).with_children(["member"]),
            ColumnDefinitionRow::new("member", "member", "mimeUri", false),
        ])
        .unwrap();
        let doc = defs.to_schema_document().unwrap();
        let rebuilt = ColumnDefinitions::from_document(&doc).unwrap();
        assert_eq!(rebuilt.to_schema_document().unwrap(), doc);
        assert_eq!(rebuilt.get("member").unwrap().element_type, ElementType::Custom("mimeUri".into()));
        assert_eq!(rebuilt.path("member"), vec!["household", "members", "items"]);
    }

    #[test]
    fn document_with_unknown_type_rejected() {
        let doc: SchemaDocument = serde_json::from_value(json!({
            "x": {"type": "date", "elementKey": "x", "isPersisted": true}
        }))
        .unwrap();
        assert!(matches!(
            rows_from_document(&doc),
            Err(MalformedSchema::InvalidDocument { .. })
        ));
    }

    #[test]
    fn document_array_without_items_rejected() {
        let doc: SchemaDocument = serde_json::from_value(json!({
            "tags": {"type": "array", "elementKey": "tags", "isPersisted": true}
        }))
        .unwrap();
        match rows_from_document(&doc) {
            Err(MalformedSchema::InvalidDocument { path, .. }) => assert_eq!(path, "tags"),
            other => panic!("expected InvalidDocument, got {other:?}"),
        }
    }
}
