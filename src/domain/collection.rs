//! Boundary between the hierarchy core and the collection that owns the nodes.

use crate::domain::HierarchyNode;

/// Owner of all nodes of one scene, as seen by the hierarchy core.
///
/// Only hierarchy-capable nodes are exposed. The collection must call
/// [`mark_modified`](Self::mark_modified) (or an equivalent internal bump) on
/// every node add/remove and on any change to a node's parent id or sort key,
/// otherwise child index reads go stale.
pub trait NodeCollection {
    /// Resolve an id to a hierarchy node.
    fn lookup(&self, id: &str) -> Option<&HierarchyNode>;

    /// Mutable lookup. Does not bump the modification version by itself.
    fn lookup_mut(&mut self, id: &str) -> Option<&mut HierarchyNode>;

    /// All hierarchy nodes in collection order. The order is the tie-break
    /// between siblings with equal sort keys and must be deterministic.
    fn all_nodes(&self) -> impl Iterator<Item = &HierarchyNode> + '_;

    /// Remove a hierarchy node and hand it back.
    fn remove(&mut self, id: &str) -> Option<HierarchyNode>;

    /// Monotonic modification counter.
    fn modification_version(&self) -> u64;

    /// Bump the modification counter.
    fn mark_modified(&mut self);

    fn node_count(&self) -> usize {
        self.all_nodes().count()
    }
}
