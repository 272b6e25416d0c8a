//! Document query interface and the reference JSON-tree document
//!
//! The engine never mutates a document; everything it needs is expressed by
//! [`DocumentQuery`]. [`Document`] loads an already-parsed nested node tree,
//! assigns levels (the central node is level 1) and computes Merkle content
//! hashes for nodes that do not carry one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{ConceptoError, Result};
use crate::model::Node;

/// Filter for [`DocumentQuery::get_nodes`]; unset fields do not constrain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub level: Option<u32>,
    pub icon: Option<String>,
    pub text_contains: Option<String>,
}

impl NodeFilter {
    pub fn level(level: u32) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn accepts(&self, node: &Node) -> bool {
        self.level.map_or(true, |l| node.level == l)
            && self.icon.as_deref().map_or(true, |i| node.has_icon(i))
            && self
                .text_contains
                .as_deref()
                .map_or(true, |t| node.text.contains(t))
    }
}

/// Read-only queries the compiler issues against a parsed document
pub trait DocumentQuery {
    fn get_node(&self, id: &str) -> Option<&Node>;

    /// Nodes accepted by `filter`, in document order
    fn get_nodes(&self, filter: &NodeFilter) -> Vec<&Node>;

    fn get_parent_node(&self, id: &str) -> Option<&Node>;

    /// Ancestor ids, nearest first
    fn get_parent_node_ids(&self, id: &str) -> Vec<String>;

    /// Sibling ids in document order, restricted to those before and/or after `id`
    fn get_brother_node_ids(&self, id: &str, before: bool, after: bool) -> Vec<String>;

    /// Hex SHA-256 of an arbitrary value
    fn hash(&self, value: &str) -> String {
        hex::encode(Sha256::digest(value.as_bytes()))
    }
}

/// Nested node as it appears in the JSON input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,
    #[serde(default)]
    pub nodes: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            node: Node::new(id, 0, text),
            nodes: Vec::new(),
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.node.icons.push(icon.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.node.attributes.insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, child: TreeNode) -> Self {
        self.nodes.push(child);
        self
    }

    /// Apply an arbitrary edit to the wrapped node
    pub fn with(mut self, edit: impl FnOnce(&mut Node)) -> Self {
        edit(&mut self.node);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TreeInput {
    Many(Vec<TreeNode>),
    One(TreeNode),
}

/// In-memory document built from a nested node tree
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: HashMap<String, Node>,
    /// Pre-order traversal of all node ids
    order: Vec<String>,
    parents: HashMap<String, String>,
    roots: Vec<String>,
}

impl Document {
    /// Build a document from root trees
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if a node has an empty id or an id is used twice.
    pub fn from_tree(roots: Vec<TreeNode>) -> Result<Self> {
        let mut doc = Document::default();
        for root in roots {
            let id = doc.insert(root, None, 1)?;
            doc.roots.push(id);
        }
        Ok(doc)
    }

    /// Parse a document from JSON: one root object or an array of roots
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed JSON and `InvalidDocument` for
    /// structural problems.
    pub fn from_json(text: &str) -> Result<Self> {
        let input: TreeInput = serde_json::from_str(text)?;
        match input {
            TreeInput::Many(roots) => Self::from_tree(roots),
            TreeInput::One(root) => Self::from_tree(vec![root]),
        }
    }

    fn insert(&mut self, tree: TreeNode, parent: Option<&str>, level: u32) -> Result<String> {
        let TreeNode { mut node, nodes } = tree;
        if node.id.is_empty() {
            return Err(ConceptoError::InvalidDocument {
                reason: format!("node at level {} has an empty id", level),
            });
        }
        if self.nodes.contains_key(&node.id) {
            return Err(ConceptoError::InvalidDocument {
                reason: format!("duplicate node id {}", node.id),
            });
        }

        let id = node.id.clone();
        node.level = level;
        node.children.clear();
        if let Some(parent) = parent {
            self.parents.insert(id.clone(), parent.to_string());
        }
        // Reserve the pre-order slot before descending
        self.order.push(id.clone());
        self.nodes.insert(id.clone(), node);

        let mut children = Vec::with_capacity(nodes.len());
        for child in nodes {
            children.push(self.insert(child, Some(&id), level + 1)?);
        }

        let child_hashes: Vec<String> = children
            .iter()
            .filter_map(|c| self.nodes.get(c).map(|n| n.content_hash.clone()))
            .collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = children;
            if node.content_hash.is_empty() {
                node.content_hash = content_hash(node, &child_hashes)?;
            }
        }
        Ok(id)
    }

    /// Get a node by id
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the id is unknown.
    pub fn node(&self, id: &str) -> Result<&Node> {
        self.nodes.get(id).ok_or_else(|| ConceptoError::NodeNotFound {
            node_id: id.to_string(),
        })
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// All nodes in document order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Merkle hash over the node's own fields and its children's hashes
fn content_hash(node: &Node, child_hashes: &[String]) -> Result<String> {
    let mut own = node.clone();
    own.children.clear();
    own.content_hash.clear();
    let canonical = serde_json::to_string(&own)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    for child in child_hashes {
        hasher.update(b"\n");
        hasher.update(child.as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

impl DocumentQuery for Document {
    fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn get_nodes(&self, filter: &NodeFilter) -> Vec<&Node> {
        self.iter().filter(|n| filter.accepts(n)).collect()
    }

    fn get_parent_node(&self, id: &str) -> Option<&Node> {
        self.parents.get(id).and_then(|p| self.nodes.get(p))
    }

    fn get_parent_node_ids(&self, id: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut current = self.parents.get(id);
        while let Some(parent) = current {
            ids.push(parent.clone());
            current = self.parents.get(parent);
        }
        ids
    }

    fn get_brother_node_ids(&self, id: &str, before: bool, after: bool) -> Vec<String> {
        let siblings: &[String] = match self.get_parent_node(id) {
            Some(parent) => &parent.children,
            None if self.nodes.contains_key(id) => &self.roots,
            None => return Vec::new(),
        };
        let Some(pos) = siblings.iter().position(|s| s == id) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        if before {
            out.extend(siblings[..pos].iter().cloned());
        }
        if after {
            out.extend(siblings[pos + 1..].iter().cloned());
        }
        out
    }
}
