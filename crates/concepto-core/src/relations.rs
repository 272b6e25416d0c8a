//! Relationship queries
//!
//! Ancestor and sibling predicates are defined over the *resolved* command
//! of the related nodes, not over structural parentage alone. Ancestors are
//! resolved on demand with an empty branch state; the resolver's per-node
//! memo keeps the total work linear in the number of nodes.

use crate::document::DocumentQuery;
use crate::matcher::{matches_local, Predicate};
use crate::model::{Node, StateMap};
use crate::resolver::Resolver;

impl<'r, D: DocumentQuery + ?Sized> Resolver<'r, D> {
    pub(crate) fn matches_relational(
        &mut self,
        predicate: &Predicate,
        node: &Node,
        global: &StateMap,
    ) -> bool {
        match predicate {
            Predicate::AnyAncestorIs(ids) => self.has_ancestor_command(node, ids, global),
            Predicate::AllAncestorsInclude(ids) => {
                let trail = self.ancestor_command_ids(node, global);
                ids.iter().all(|id| trail.contains(id))
            }
            Predicate::ExactParentIs(ids) => self
                .parent_command_id(node, global)
                .is_some_and(|parent| ids.contains(&parent)),
            other => matches_local(other, node).unwrap_or(false),
        }
    }

    /// Resolved command id of a node, if it resolves to a valid command
    pub fn resolved_command_id(&mut self, node_id: &str, global: &StateMap) -> Option<String> {
        let doc = self.doc;
        let node = doc.get_node(node_id)?;
        self.resolve_valid(node, &StateMap::new(), global)
            .ok()
            .map(|r| r.command_id)
    }

    /// Resolved command ids of the node's ancestors, root first
    ///
    /// Ancestors without a valid command are skipped.
    pub fn ancestor_command_ids(&mut self, node: &Node, global: &StateMap) -> Vec<String> {
        let mut ids: Vec<String> = self
            .doc
            .get_parent_node_ids(&node.id)
            .iter()
            .filter_map(|parent| self.resolved_command_id(parent, global))
            .collect();
        ids.reverse();
        ids
    }

    /// Resolved command id of the direct parent
    pub fn parent_command_id(&mut self, node: &Node, global: &StateMap) -> Option<String> {
        let parent = self.doc.get_parent_node(&node.id)?;
        let parent_id = parent.id.clone();
        self.resolved_command_id(&parent_id, global)
    }

    /// Whether any ancestor resolves to one of `command_ids`
    ///
    /// Walks nearest first and stops at the first hit.
    pub fn has_ancestor_command(
        &mut self,
        node: &Node,
        command_ids: &[String],
        global: &StateMap,
    ) -> bool {
        self.doc
            .get_parent_node_ids(&node.id)
            .iter()
            .any(|parent| {
                self.resolved_command_id(parent, global)
                    .is_some_and(|id| command_ids.contains(&id))
            })
    }

    /// Whether the node has a sibling before it
    pub fn has_brother_before(&mut self, node: &Node) -> bool {
        self.has_brother(node, true)
    }

    /// Whether the node has a sibling after it
    pub fn has_brother_next(&mut self, node: &Node) -> bool {
        self.has_brother(node, false)
    }

    fn has_brother(&mut self, node: &Node, before: bool) -> bool {
        let key = (node.id.clone(), before);
        if let Some(&hit) = self.brother_memo.get(&key) {
            return hit;
        }
        let found = !self
            .doc
            .get_brother_node_ids(&node.id, before, !before)
            .is_empty();
        self.brother_memo.insert(key, found);
        found
    }

    /// Whether any sibling resolves to `command_id`
    pub fn has_brother_command(
        &mut self,
        node: &Node,
        command_id: &str,
        global: &StateMap,
    ) -> bool {
        self.doc
            .get_brother_node_ids(&node.id, true, true)
            .iter()
            .any(|brother| self.resolved_command_id(brother, global).as_deref() == Some(command_id))
    }
}
