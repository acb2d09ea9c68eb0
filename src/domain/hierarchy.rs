//! Structural queries and edits over an id-linked forest.
//!
//! [`Hierarchy`] owns a node collection together with its [`ChildIndex`].
//! Reads go through the index and never mutate nodes; edits mutate nodes and
//! bump the collection's modification version so the next read rebuilds.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::child_index::ChildIndex;
use crate::domain::collection::NodeCollection;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{HierarchyNode, NodeId};
use crate::domain::scene::Scene;

/// Spacing between sibling sort keys when placing at the ends or renumbering.
pub const DEFAULT_SORT_KEY_STEP: f64 = 1.0;

/// A node collection and the child index derived from it.
///
/// Queries take `&self`; the index is refreshed through a `RefCell`, so the
/// registry is `Send` but not `Sync`. Share it across threads behind one lock.
#[derive(Debug)]
pub struct Hierarchy<C: NodeCollection> {
    scene: C,
    index: RefCell<ChildIndex>,
    sort_key_step: f64,
}

impl<C: NodeCollection> Hierarchy<C> {
    pub fn new(scene: C) -> Self {
        Self {
            scene,
            index: RefCell::new(ChildIndex::new()),
            sort_key_step: DEFAULT_SORT_KEY_STEP,
        }
    }

    /// Use `step` as sort key spacing. Non-finite or non-positive values are
    /// ignored.
    pub fn with_sort_key_step(mut self, step: f64) -> Self {
        if step.is_finite() && step > 0.0 {
            self.sort_key_step = step;
        } else {
            warn!(step, "ignoring invalid sort key step");
        }
        self
    }

    pub fn sort_key_step(&self) -> f64 {
        self.sort_key_step
    }

    pub fn scene(&self) -> &C {
        &self.scene
    }

    /// Direct access for out-of-band edits. Call [`Self::invalidate`] after
    /// changing parent ids or sort keys this way.
    pub fn scene_mut(&mut self) -> &mut C {
        &mut self.scene
    }

    pub fn into_scene(self) -> C {
        self.scene
    }

    /// Mark the hierarchy modified after an edit not routed through this type.
    #[instrument(level = "debug", skip(self))]
    pub fn invalidate(&mut self) {
        self.scene.mark_modified();
        self.index.get_mut().invalidate();
    }

    /// Number of child index rebuilds so far.
    pub fn rebuild_count(&self) -> u64 {
        self.index.borrow().rebuild_count()
    }

    pub fn node(&self, id: &str) -> Option<&HierarchyNode> {
        self.scene.lookup(id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Resolved parent; `None` for roots and dangling parent ids.
    #[instrument(level = "trace", skip(self))]
    pub fn parent(&self, id: &str) -> Option<&HierarchyNode> {
        let parent_id = self.node(id)?.parent_id()?;
        self.scene.lookup(parent_id.as_str())
    }

    /// Parent chain, nearest first. Stops at the first repeated node.
    #[instrument(level = "debug", skip(self))]
    pub fn ancestors(&self, id: &str) -> Vec<&HierarchyNode> {
        self.walk_ancestors(id).0
    }

    /// Topmost ancestor, or the node itself when it has no parent.
    ///
    /// The walk visits each node at most once; on a cycle it stops at the
    /// last node not yet seen.
    #[instrument(level = "debug", skip(self))]
    pub fn top_parent(&self, id: &str) -> Option<&HierarchyNode> {
        let node = self.node(id)?;
        let (chain, _) = self.walk_ancestors(id);
        Some(chain.last().copied().unwrap_or(node))
    }

    /// Ids of direct children in sibling order.
    pub fn child_ids(&self, id: &str) -> Arc<[NodeId]> {
        self.index.borrow_mut().children(&self.scene, id)
    }

    /// Direct children in sibling order.
    #[instrument(level = "trace", skip(self))]
    pub fn children(&self, id: &str) -> Vec<&HierarchyNode> {
        let ids = self.child_ids(id);
        self.resolve_all(&ids)
    }

    pub fn child_count(&self, id: &str) -> usize {
        self.child_ids(id).len()
    }

    pub fn nth_child(&self, id: &str, n: usize) -> Option<&HierarchyNode> {
        let ids = self.child_ids(id);
        let child = ids.get(n)?;
        self.scene.lookup(child.as_str())
    }

    /// Ids of all roots (no parent or unresolvable parent) in sibling order.
    pub fn root_ids(&self) -> Arc<[NodeId]> {
        self.index.borrow_mut().roots(&self.scene)
    }

    pub fn roots(&self) -> Vec<&HierarchyNode> {
        let ids = self.root_ids();
        self.resolve_all(&ids)
    }

    /// Every descendant, depth-first pre-order, siblings in sort order.
    ///
    /// A node reached twice means the forest contains a cycle: the walk stops
    /// and returns what it collected so far.
    #[instrument(level = "debug", skip(self))]
    pub fn descendants(&self, id: &str) -> Vec<&HierarchyNode> {
        let (ids, _) = self.walk_descendants(id);
        self.resolve_all(&ids)
    }

    /// Nodes no root reaches: members of a parent cycle and everything below
    /// one. Collection order.
    #[instrument(level = "debug", skip(self))]
    pub fn unrooted_ids(&self) -> Vec<NodeId> {
        let mut reached: HashSet<NodeId> = HashSet::new();
        for root in self.root_ids().iter() {
            reached.insert(root.clone());
            reached.extend(self.walk_descendants(root.as_str()).0);
        }
        self.scene
            .all_nodes()
            .map(HierarchyNode::id)
            .filter(|id| !reached.contains(*id))
            .cloned()
            .collect()
    }

    /// Position among the parent's children, or among the roots when the
    /// node has no resolvable parent.
    #[instrument(level = "debug", skip(self))]
    pub fn index_in_parent(&self, id: &str) -> Option<usize> {
        self.node(id)?;
        self.sibling_ids(id).iter().position(|s| s.as_str() == id)
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Set or clear the parent reference.
    ///
    /// A parent id that does not resolve is accepted (it may be loaded later).
    /// A resolvable parent is rejected when it is the node itself or one of
    /// its descendants.
    #[instrument(level = "debug", skip(self))]
    pub fn set_parent(&mut self, id: &str, parent_id: Option<&str>) -> DomainResult<()> {
        self.require(id)?;
        if let Some(parent) = parent_id {
            if parent == id {
                return Err(DomainError::InvalidParent {
                    node: NodeId::from(id),
                    reason: "node cannot be its own parent".to_string(),
                });
            }
            if self.node(parent).is_some()
                && self.ancestors(parent).iter().any(|a| a.id().as_str() == id)
            {
                return Err(DomainError::InvalidParent {
                    node: NodeId::from(id),
                    reason: format!("{parent} is a descendant"),
                });
            }
        }

        self.node_mut(id)?.set_parent_id(parent_id.map(NodeId::from));
        self.scene.mark_modified();
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_sort_key(&mut self, id: &str, sort_key: f64) -> DomainResult<()> {
        self.node_mut(id)?.set_sort_key(sort_key);
        self.scene.mark_modified();
        Ok(())
    }

    /// Move a node to position `index` among its siblings by giving it a new
    /// sort key. Indices past the end place the node last.
    ///
    /// The new key lies strictly between the new neighbours, or one step
    /// outside the range at either end. If no such key is representable all
    /// siblings are renumbered with evenly spaced keys. Returns the position
    /// actually used.
    #[instrument(level = "debug", skip(self))]
    pub fn set_index_in_parent(&mut self, id: &str, index: usize) -> DomainResult<usize> {
        self.require(id)?;
        let siblings: Vec<(NodeId, f64)> = self
            .sibling_ids(id)
            .iter()
            .filter(|s| s.as_str() != id)
            .filter_map(|s| self.scene.lookup(s.as_str()))
            .map(|n| (n.id().clone(), n.sort_key()))
            .collect();
        let target = index.min(siblings.len());

        let prev = target.checked_sub(1).map(|i| siblings[i].1);
        let next = siblings.get(target).map(|s| s.1);
        let step = self.sort_key_step;
        let candidate = match (prev, next) {
            (None, None) => {
                debug!("no siblings, order unchanged");
                return Ok(0);
            }
            (None, Some(next)) => next - step,
            (Some(prev), None) => prev + step,
            (Some(prev), Some(next)) => prev + (next - prev) / 2.0,
        };

        if fits_between(prev, candidate, next) {
            self.node_mut(id)?.set_sort_key(candidate);
        } else {
            debug!(target, "no gap between neighbours, renumbering siblings");
            let mut order: Vec<NodeId> = siblings.into_iter().map(|(s, _)| s).collect();
            order.insert(target, NodeId::from(id));
            for (position, sibling) in order.iter().enumerate() {
                if let Some(node) = self.scene.lookup_mut(sibling.as_str()) {
                    node.set_sort_key(position as f64 * step);
                }
            }
        }
        self.scene.mark_modified();
        Ok(target)
    }

    /// Promote the direct children of `id` to its parent, keeping their
    /// relative order. The node itself stays; returns the promoted ids.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_children_only(&mut self, id: &str) -> DomainResult<Vec<NodeId>> {
        let new_parent = self.require(id)?.parent_id().cloned();
        let children = self.child_ids(id);
        for child in children.iter() {
            if let Some(node) = self.scene.lookup_mut(child.as_str()) {
                node.set_parent_id(new_parent.clone());
            }
        }
        if !children.is_empty() {
            self.scene.mark_modified();
        }
        Ok(children.to_vec())
    }

    /// Remove the whole subtree below `id` from the collection, children
    /// before their parents. The node itself stays; returns the removed nodes
    /// in removal order.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_all_descendants(&mut self, id: &str) -> DomainResult<Vec<HierarchyNode>> {
        self.require(id)?;
        let (preorder, _) = self.walk_descendants(id);
        // reversed pre-order puts every node after all of its descendants
        let removed: Vec<HierarchyNode> = preorder
            .iter()
            .rev()
            .filter_map(|d| self.scene.remove(d.as_str()))
            .collect();
        debug!(count = removed.len(), "removed descendants");
        Ok(removed)
    }

    /// Rewrite every parent reference to `old_id` into `new_id`. Returns the
    /// number of rewired nodes.
    #[instrument(level = "debug", skip(self))]
    pub fn rename_reference(&mut self, old_id: &str, new_id: &str) -> usize {
        if old_id == new_id {
            return 0;
        }
        let children = self.child_ids(old_id);
        for child in children.iter() {
            if let Some(node) = self.scene.lookup_mut(child.as_str()) {
                node.set_parent_id(Some(NodeId::from(new_id)));
            }
        }
        if !children.is_empty() {
            self.scene.mark_modified();
        }
        children.len()
    }

    /// Hook to run before `id` leaves the collection: its children move up to
    /// its former parent instead of being orphaned.
    pub fn on_node_removed(&mut self, id: &str) -> DomainResult<Vec<NodeId>> {
        self.remove_children_only(id)
    }

    /// Reparent the children of `id` and remove it from the collection.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_node(&mut self, id: &str) -> DomainResult<HierarchyNode> {
        self.on_node_removed(id)?;
        self.scene
            .remove(id)
            .ok_or_else(|| DomainError::NodeNotFound(NodeId::from(id)))
    }

    /// Clear parent ids that no longer resolve. Returns the affected ids.
    #[instrument(level = "debug", skip(self))]
    pub fn prune_dangling_references(&mut self) -> Vec<NodeId> {
        let dangling: Vec<NodeId> = self
            .scene
            .all_nodes()
            .filter(|n| {
                n.parent_id()
                    .is_some_and(|p| self.scene.lookup(p.as_str()).is_none())
            })
            .map(|n| n.id().clone())
            .collect();
        for id in &dangling {
            if let Some(node) = self.scene.lookup_mut(id.as_str()) {
                node.set_parent_id(None);
            }
        }
        if !dangling.is_empty() {
            self.scene.mark_modified();
        }
        dangling
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require(&self, id: &str) -> DomainResult<&HierarchyNode> {
        self.node(id)
            .ok_or_else(|| DomainError::NodeNotFound(NodeId::from(id)))
    }

    fn node_mut(&mut self, id: &str) -> DomainResult<&mut HierarchyNode> {
        self.scene
            .lookup_mut(id)
            .ok_or_else(|| DomainError::NodeNotFound(NodeId::from(id)))
    }

    fn resolve_all(&self, ids: &[NodeId]) -> Vec<&HierarchyNode> {
        ids.iter()
            .filter_map(|id| self.scene.lookup(id.as_str()))
            .collect()
    }

    /// Siblings of `id` including itself: the parent's children, or the roots.
    fn sibling_ids(&self, id: &str) -> Arc<[NodeId]> {
        match self.parent(id) {
            Some(parent) => self.child_ids(parent.id().as_str()),
            None => self.root_ids(),
        }
    }

    fn walk_ancestors(&self, id: &str) -> (Vec<&HierarchyNode>, bool) {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if !seen.insert(parent.id().as_str()) {
                warn!(node = id, at = %parent.id(), "cycle in parent chain, walk stopped");
                return (chain, true);
            }
            chain.push(parent);
            current = parent.id().as_str();
        }
        (chain, false)
    }

    fn walk_descendants(&self, id: &str) -> (Vec<NodeId>, bool) {
        let mut out = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::from([NodeId::from(id)]);
        let mut stack: Vec<NodeId> = self.child_ids(id).iter().rev().cloned().collect();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                warn!(node = id, at = %current, "cycle below node, traversal stopped");
                return (out, true);
            }
            stack.extend(self.child_ids(current.as_str()).iter().rev().cloned());
            out.push(current);
        }
        (out, false)
    }
}

impl Hierarchy<Scene> {
    /// Rename a node in the scene and rewire its children to the new id.
    /// Returns the number of rewired children.
    #[instrument(level = "debug", skip(self))]
    pub fn rename_node(&mut self, old_id: &str, new_id: &str) -> DomainResult<usize> {
        self.scene.rename(old_id, NodeId::from(new_id))?;
        Ok(self.rename_reference(old_id, new_id))
    }
}

fn fits_between(prev: Option<f64>, candidate: f64, next: Option<f64>) -> bool {
    candidate.is_finite()
        && prev.map_or(true, |p| p < candidate)
        && next.map_or(true, |n| candidate < n)
}
