//! Property tests over randomly shaped column forests.

use std::collections::BTreeSet;

use proptest::prelude::*;
use proptest::sample::Index;

use datamodel_core::{ColumnDefinitionRow, ColumnDefinitions, MalformedSchema, SchemaNode};

/// Per node: (attach to an earlier node?, which one, persisted, prefer array).
type NodeSpec = (bool, Index, bool, bool);

struct Forest {
    rows: Vec<ColumnDefinitionRow>,
    root_names: BTreeSet<String>,
    depth: usize,
    child_counts: Vec<usize>,
}

fn forest(nodes: &[NodeSpec]) -> Forest {
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(nodes.len());
    let mut depths: Vec<usize> = Vec::with_capacity(nodes.len());
    for (i, (attach, idx, _, _)) in nodes.iter().enumerate() {
        let parent = if i > 0 && *attach { Some(idx.index(i)) } else { None };
        depths.push(parent.map_or(1, |p| depths[p] + 1));
        parents.push(parent);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, parent) in parents.iter().enumerate() {
        if let Some(p) = parent {
            children[*p].push(i);
        }
    }

    let mut rows = Vec::new();
    let mut root_names = BTreeSet::new();
    for (i, (_, _, persisted, prefer_array)) in nodes.iter().enumerate() {
        let ty = match children[i].len() {
            0 => "string",
            1 if *prefer_array => "array",
            _ => "object",
        };
        if parents[i].is_none() {
            root_names.insert(format!("n{i}"));
        }
        rows.push(
            ColumnDefinitionRow::new(format!("k{i}"), format!("n{i}"), ty, *persisted)
                .with_children(children[i].iter().map(|c| format!("k{c}"))),
        );
    }
    // Children appear before their parents in the row set.
    rows.reverse();

    Forest {
        rows,
        root_names,
        depth: depths.into_iter().max().unwrap_or(0),
        child_counts: children.iter().map(Vec::len).collect(),
    }
}

fn node_depth(node: &SchemaNode) -> usize {
    let below = node
        .items
        .iter()
        .map(|n| node_depth(n))
        .chain(node.properties.iter().flat_map(|p| p.values().map(node_depth)))
        .max()
        .unwrap_or(0);
    1 + below
}

fn node_specs() -> impl Strategy<Value = Vec<NodeSpec>> {
    prop::collection::vec(
        (any::<bool>(), any::<Index>(), any::<bool>(), any::<bool>()),
        1..24,
    )
}

proptest! {
    #[test]
    fn document_roots_and_depth_match_forest(nodes in node_specs()) {
        let f = forest(&nodes);
        let defs = ColumnDefinitions::build(f.rows).unwrap();
        prop_assert_eq!(defs.depth(), f.depth);

        let doc = defs.to_schema_document().unwrap();
        let keys: BTreeSet<String> = doc.keys().cloned().collect();
        prop_assert_eq!(&keys, &f.root_names);

        let doc_depth = doc.values().map(node_depth).max().unwrap_or(0);
        prop_assert_eq!(doc_depth, f.depth);
    }

    #[test]
    fn serialization_is_byte_identical(nodes in node_specs()) {
        let f = forest(&nodes);
        let mut shuffled = f.rows.clone();
        let mid = shuffled.len() / 2;
        shuffled.rotate_left(mid);

        let a = ColumnDefinitions::build(f.rows).unwrap().to_schema_document().unwrap();
        let b = ColumnDefinitions::build(shuffled).unwrap().to_schema_document().unwrap();
        prop_assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn dangling_child_reference_fails_build(nodes in node_specs(), victim in any::<Index>()) {
        let f = forest(&nodes);
        let mut rows = f.rows;
        let i = victim.index(rows.len());
        rows[i].element_type = "object".into();
        rows[i].children.push("no_such_column".to_string());

        match ColumnDefinitions::build(rows) {
            Err(MalformedSchema::MissingChild { child, .. }) => prop_assert_eq!(child, "no_such_column"),
            other => prop_assert!(false, "expected MissingChild, got {:?}", other),
        }
    }

    #[test]
    fn array_needs_exactly_one_child(nodes in node_specs(), victim in any::<Index>()) {
        let f = forest(&nodes);
        let n = f.child_counts.len();
        let node = victim.index(n);
        let mut rows = f.rows;
        // Rows were reversed, so node `i` sits at `n - 1 - i`.
        rows[n - 1 - node].element_type = "array".into();

        let result = ColumnDefinitions::build(rows);
        if f.child_counts[node] == 1 {
            prop_assert!(result.is_ok());
        } else {
            let is_arity = matches!(result, Err(MalformedSchema::ArrayArity { .. }));
            prop_assert!(is_arity);
        }
    }
}
