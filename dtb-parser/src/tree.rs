//! Materialized views of a decoded blob.
//!
//! Both views are built by the same depth-first walk, so they always agree on paths and
//! property values. The walk recurses once per level of nesting; device trees are only
//! a few levels deep in practice.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{fdt::FdtNode, value::PropertyValue};

/// Decoded properties of a node, keyed by name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A device tree node with decoded properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    pub path: String,
    pub properties: Properties,
    pub children: Vec<Node>,
}

impl Node {
    /// Unit address of the node, i.e. everything after the first `@` in its name.
    pub fn unit_address(&self) -> Option<&str> {
        unit_address(&self.name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Find a descendant (or this node) by absolute path.
    pub fn find(&self, path: &str) -> Option<&Node> {
        if self.path == path {
            return Some(self);
        }

        self.children
            .iter()
            .filter(|child| is_ancestor_or_self(&child.path, path))
            .find_map(|child| child.find(path))
    }
}

/// Record form of a node, with the unit address split out of the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub path: String,
    pub name: String,
    pub address: Option<String>,
    pub props: Properties,
    pub children: Vec<NodeRecord>,
}

/// Per-node data handed to the assemble step of [`walk`].
pub(crate) struct Visit {
    pub name: String,
    pub path: String,
    pub properties: Properties,
}

/// Depth-first walk starting at `node`, located at `path`.
///
/// Children are walked first, in blob order, and their results passed to `assemble`
/// together with the node's own decoded data.
pub(crate) fn walk<T, F>(node: &FdtNode, path: String, assemble: &mut F) -> T
where
    F: FnMut(Visit, Vec<T>) -> T,
{
    let properties = node
        .props()
        .map(|(name, data)| (name.to_string(), PropertyValue::decode(data)))
        .collect();

    let children = node
        .subnodes()
        .map(|child| walk(child, join_path(&path, child.name()), &mut *assemble))
        .collect();

    let visit = Visit {
        name: node_name(&path).to_string(),
        path,
        properties,
    };

    assemble(visit, children)
}

/// Build the node tree rooted at `root`.
pub(crate) fn build_nodes(root: &FdtNode) -> Node {
    walk(root, "/".to_string(), &mut |visit: Visit, children| Node {
        name: visit.name,
        path: visit.path,
        properties: visit.properties,
        children,
    })
}

/// Build the record tree rooted at `root`.
pub(crate) fn build_records(root: &FdtNode) -> NodeRecord {
    walk(root, "/".to_string(), &mut |visit: Visit, children| NodeRecord {
        address: unit_address(&visit.name).map(str::to_string),
        path: visit.path,
        name: visit.name,
        props: visit.properties,
        children,
    })
}

/// Append `name` to `parent`, without doubling the slash after the root.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Last segment of `path`, empty for the root.
pub fn node_name(path: &str) -> &str {
    if path == "/" {
        return "";
    }

    path.rsplit('/').next().unwrap_or_default()
}

/// Everything after the first `@` of a node name.
pub fn unit_address(name: &str) -> Option<&str> {
    name.split_once('@').map(|(_, address)| address)
}

fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
