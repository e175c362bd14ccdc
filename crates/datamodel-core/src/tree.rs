//! The column-definition forest of one table.
//!
//! [`ColumnDefinitions`] is an arena of [`ColumnDefinition`] nodes keyed by
//! element key. Roots and children share one flat map; a node is a root when
//! its `parent` is `None`. A successfully built value always satisfies:
//!
//! - every child key resolves to a node in the same map,
//! - every non-root node has exactly one parent, listing it once,
//! - `array` nodes have exactly one child and scalars have none,
//! - sibling element names are unique (roots count as siblings),
//! - the parent/child relation is acyclic.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::column::{ColumnDefinition, ColumnDefinitionRow, StoredColumnRow};
use crate::element::ElementType;
use crate::error::MalformedSchema;

/// All column definitions of a table, linked into a forest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDefinitions {
    nodes: BTreeMap<String, ColumnDefinition>,
}

impl ColumnDefinitions {
    /// Decodes stored rows and links them.
    ///
    /// Every row is decoded before any linking happens, so a decode failure
    /// is reported even when a missing child would also be found.
    pub fn from_stored<I>(rows: I) -> Result<Self, MalformedSchema>
    where
        I: IntoIterator<Item = StoredColumnRow>,
    {
        let decoded = rows
            .into_iter()
            .map(StoredColumnRow::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(decoded)
    }

    /// Links decoded rows into a forest, failing on the first structural
    /// violation. An empty row set gives an empty forest.
    pub fn build<I>(rows: I) -> Result<Self, MalformedSchema>
    where
        I: IntoIterator<Item = ColumnDefinitionRow>,
    {
        let mut nodes: BTreeMap<String, ColumnDefinition> = BTreeMap::new();
        for row in rows {
            let key = row.element_key.clone();
            if nodes.insert(key.clone(), ColumnDefinition::from_row(row)).is_some() {
                return Err(MalformedSchema::DuplicateElementKey { element_key: key });
            }
        }

        // Second pass: resolve child keys and record each child's parent.
        let mut parents: HashMap<String, String> = HashMap::new();
        for node in nodes.values() {
            for child in &node.children {
                if !nodes.contains_key(child) {
                    return Err(MalformedSchema::MissingChild {
                        parent: node.element_key.clone(),
                        child: child.clone(),
                    });
                }
                if let Some(first) = parents.insert(child.clone(), node.element_key.clone()) {
                    if first == node.element_key {
                        return Err(MalformedSchema::DuplicateChild {
                            parent: first,
                            child: child.clone(),
                        });
                    }
                    return Err(MalformedSchema::MultipleParents {
                        child: child.clone(),
                        first,
                        second: node.element_key.clone(),
                    });
                }
            }
        }
        for (child, parent) in parents {
            if let Some(node) = nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
        }

        let defs = ColumnDefinitions { nodes };
        defs.check_acyclic()?;
        defs.check_arrays()?;
        defs.check_scalars()?;
        defs.check_sibling_names()?;
        Ok(defs)
    }

    fn check_acyclic(&self) -> Result<(), MalformedSchema> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for node in self.nodes.values() {
            graph.add_node(node.element_key.as_str());
            for child in &node.children {
                graph.add_edge(node.element_key.as_str(), child.as_str(), ());
            }
        }
        toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| MalformedSchema::Cycle {
                element_key: cycle.node_id().to_string(),
            })
    }

    fn check_arrays(&self) -> Result<(), MalformedSchema> {
        for node in self.nodes.values() {
            if node.element_type == ElementType::Array && node.children.len() != 1 {
                return Err(MalformedSchema::ArrayArity {
                    element_key: node.element_key.clone(),
                    children: node.children.len(),
                });
            }
        }
        Ok(())
    }

    fn check_scalars(&self) -> Result<(), MalformedSchema> {
        for node in self.nodes.values() {
            if node.element_type.is_scalar() && !node.children.is_empty() {
                return Err(MalformedSchema::ScalarWithChildren {
                    element_key: node.element_key.clone(),
                    children: node.children.len(),
                });
            }
        }
        Ok(())
    }

    fn check_sibling_names(&self) -> Result<(), MalformedSchema> {
        let mut seen = HashSet::new();
        for root in self.roots() {
            if !seen.insert(root.element_name.as_str()) {
                return Err(MalformedSchema::DuplicateElementName {
                    element_name: root.element_name.clone(),
                    scope: "table root".to_string(),
                });
            }
        }
        for node in self.nodes.values() {
            let mut seen = HashSet::new();
            for child in self.children(&node.element_key) {
                if !seen.insert(child.element_name.as_str()) {
                    return Err(MalformedSchema::DuplicateElementName {
                        element_name: child.element_name.clone(),
                        scope: format!("column '{}'", node.element_key),
                    });
                }
            }
        }
        Ok(())
    }

    /// Wraps nodes without any linking or validation.
    #[cfg(test)]
    pub(crate) fn from_nodes_unchecked(nodes: Vec<ColumnDefinition>) -> Self {
        ColumnDefinitions {
            nodes: nodes.into_iter().map(|n| (n.element_key.clone(), n)).collect(),
        }
    }

    /// Looks up a node by element key.
    pub fn get(&self, element_key: &str) -> Option<&ColumnDefinition> {
        self.nodes.get(element_key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over every node in element-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnDefinition)> {
        self.nodes.iter()
    }

    /// Nodes without a parent, in element-key order.
    pub fn roots(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.nodes.values().filter(|n| n.is_root())
    }

    /// The children of `element_key`, in declared order.
    ///
    /// Yields nothing if the key does not exist.
    pub fn children<'a>(&'a self, element_key: &str) -> impl Iterator<Item = &'a ColumnDefinition> + 'a {
        self.nodes
            .get(element_key)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |key| self.nodes.get(key))
    }

    pub fn parent(&self, element_key: &str) -> Option<&ColumnDefinition> {
        self.nodes
            .get(element_key)
            .and_then(|n| n.parent.as_deref())
            .and_then(|p| self.nodes.get(p))
    }

    /// Element names from the root down to `element_key`, e.g.
    /// `["household", "members", "age"]`.
    ///
    /// Returns an empty vec if the key does not exist.
    pub fn path(&self, element_key: &str) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current = match self.nodes.get(element_key) {
            Some(n) => n,
            None => return parts,
        };
        loop {
            parts.push(current.element_name.clone());
            match self.parent(&current.element_key) {
                Some(p) => current = p,
                None => break,
            }
        }
        parts.reverse();
        parts
    }

    /// Number of nodes on the longest root-to-leaf path; 0 when empty.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack: Vec<(&str, usize)> = self.roots().map(|r| (r.element_key.as_str(), 1)).collect();
        while let Some((key, depth)) = stack.pop() {
            max = max.max(depth);
            for child in self.children(key) {
                stack.push((child.element_key.as_str(), depth + 1));
            }
        }
        max
    }

    /// Element keys of every node backed by a physical column.
    pub fn persisted_columns(&self) -> Vec<&str> {
        self.nodes
            .values()
            .filter(|n| n.is_persisted)
            .map(|n| n.element_key.as_str())
            .collect()
    }
}
