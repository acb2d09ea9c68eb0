//! In-memory scene: arena-backed node storage with id lookup.

use std::collections::HashMap;

use generational_arena::{Arena, Index};
use tracing::{debug, instrument};

use crate::domain::collection::NodeCollection;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{DataNode, HierarchyNode, NodeId, SceneNode};

/// Collection of scene nodes.
///
/// Uses a generational arena for storage and a side table for id lookups.
/// Collection order is the order of insertion; removed nodes leave no gap.
#[derive(Debug, Default)]
pub struct Scene {
    /// Arena storage for all nodes
    arena: Arena<SceneNode>,
    /// Id to arena slot
    ids: HashMap<NodeId, Index>,
    /// Arena slots in insertion order
    order: Vec<Index>,
    /// Modification counter read by the child index
    version: u64,
    /// Largest sort key in the scene, valid while `max_sort_key_at == version`
    max_sort_key: f64,
    max_sort_key_at: u64,
    /// Per-tag counters for generated ids
    id_counters: HashMap<String, u64>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. A hierarchy node without an assigned sort key gets one
    /// that sorts after every key currently in the scene.
    #[instrument(level = "trace", skip(self, node))]
    pub fn add(&mut self, node: impl Into<SceneNode>) -> DomainResult<&NodeId> {
        let mut node = node.into();
        if self.ids.contains_key(node.id().as_str()) {
            return Err(DomainError::DuplicateId(node.id().clone()));
        }
        let mut max = self.current_max_sort_key();
        if let Some(hierarchy) = node.as_hierarchy_mut() {
            if !hierarchy.has_assigned_sort_key() {
                hierarchy.set_sort_key(max + 1.0);
            }
            max = max_key(max, hierarchy.sort_key());
        }

        let id = node.id().clone();
        let idx = self.arena.insert(node);
        self.ids.insert(id, idx);
        self.order.push(idx);
        self.version += 1;
        self.max_sort_key = max;
        self.max_sort_key_at = self.version;

        Ok(self.arena[idx].id())
    }

    /// Insert a node under an id generated from `tag`, e.g. `Hierarchy3`.
    pub fn add_with_generated_id(&mut self, node: impl Into<SceneNode>) -> DomainResult<NodeId> {
        let mut node = node.into();
        let id = self.unique_id(node.tag());
        node.set_id(id.clone());
        self.add(node)?;
        Ok(id)
    }

    /// Next free id of the form `<tag><n>`.
    pub fn unique_id(&mut self, tag: &str) -> NodeId {
        loop {
            let counter = self.id_counters.entry(tag.to_string()).or_insert(0);
            *counter += 1;
            let candidate = NodeId::new(format!("{tag}{counter}"));
            if !self.ids.contains_key(candidate.as_str()) {
                return candidate;
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&SceneNode> {
        self.ids.get(id).and_then(|&idx| self.arena.get(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Remove any node, hierarchy or not.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_node(&mut self, id: &str) -> Option<SceneNode> {
        let idx = self.ids.remove(id)?;
        self.order.retain(|&i| i != idx);
        self.version += 1;
        debug!("removed node {}", id);
        self.arena.remove(idx)
    }

    /// Change the id of a node. References held by other nodes are not
    /// rewritten here; see [`Hierarchy::rename_node`](crate::domain::Hierarchy::rename_node).
    #[instrument(level = "debug", skip(self))]
    pub fn rename(&mut self, old_id: &str, new_id: NodeId) -> DomainResult<()> {
        if old_id == new_id.as_str() {
            if self.contains(old_id) {
                return Ok(());
            }
            return Err(DomainError::NodeNotFound(new_id));
        }
        if self.ids.contains_key(new_id.as_str()) {
            return Err(DomainError::DuplicateId(new_id));
        }
        let idx = self
            .ids
            .remove(old_id)
            .ok_or_else(|| DomainError::NodeNotFound(NodeId::from(old_id)))?;
        if let Some(node) = self.arena.get_mut(idx) {
            node.set_id(new_id.clone());
        }
        self.ids.insert(new_id, idx);
        self.version += 1;
        Ok(())
    }

    /// All nodes in collection order, including data nodes.
    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> + '_ {
        self.order.iter().filter_map(|&idx| self.arena.get(idx))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Largest key among hierarchy nodes, rescanned after any edit that did
    /// not go through [`Self::add`]. Starts at 0.
    fn current_max_sort_key(&mut self) -> f64 {
        if self.max_sort_key_at != self.version {
            self.max_sort_key = self
                .all_nodes()
                .map(HierarchyNode::sort_key)
                .fold(0.0, max_key);
            self.max_sort_key_at = self.version;
        }
        self.max_sort_key
    }

    pub fn add_data(&mut self, id: impl Into<NodeId>, tag: impl Into<String>) -> DomainResult<&NodeId> {
        self.add(DataNode {
            id: id.into(),
            tag: tag.into(),
        })
    }
}

impl NodeCollection for Scene {
    fn lookup(&self, id: &str) -> Option<&HierarchyNode> {
        self.get(id).and_then(SceneNode::as_hierarchy)
    }

    fn lookup_mut(&mut self, id: &str) -> Option<&mut HierarchyNode> {
        let idx = *self.ids.get(id)?;
        self.arena.get_mut(idx).and_then(SceneNode::as_hierarchy_mut)
    }

    fn all_nodes(&self) -> impl Iterator<Item = &HierarchyNode> + '_ {
        self.iter().filter_map(SceneNode::as_hierarchy)
    }

    fn remove(&mut self, id: &str) -> Option<HierarchyNode> {
        self.lookup(id)?;
        match self.remove_node(id)? {
            SceneNode::Hierarchy(node) => Some(node),
            SceneNode::Data(_) => None,
        }
    }

    fn modification_version(&self) -> u64 {
        self.version
    }

    fn mark_modified(&mut self) {
        self.version += 1;
    }
}

/// Maximum under the same total order siblings are sorted by.
fn max_key(a: f64, b: f64) -> f64 {
    if b.total_cmp(&a).is_gt() {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_unsorted_nodes_when_added_then_keys_increase() {
        let mut scene = Scene::new();
        scene.add(HierarchyNode::new("a")).unwrap();
        scene.add(HierarchyNode::new("b").with_sort_key(10.0)).unwrap();
        scene.add(HierarchyNode::new("c")).unwrap();

        assert_eq!(scene.lookup("a").unwrap().sort_key(), 1.0);
        assert_eq!(scene.lookup("b").unwrap().sort_key(), 10.0);
        assert_eq!(scene.lookup("c").unwrap().sort_key(), 11.0);
    }

    #[test]
    fn given_duplicate_id_when_added_then_rejected() {
        let mut scene = Scene::new();
        scene.add(HierarchyNode::new("a")).unwrap();
        let err = scene.add(HierarchyNode::new("a")).unwrap_err();
        assert_eq!(err, DomainError::DuplicateId(NodeId::from("a")));
    }

    #[test]
    fn given_edits_then_version_advances() {
        let mut scene = Scene::new();
        let v0 = scene.modification_version();
        scene.add(HierarchyNode::new("a")).unwrap();
        let v1 = scene.modification_version();
        scene.remove("a");
        let v2 = scene.modification_version();
        assert!(v0 < v1 && v1 < v2);
    }

    #[test]
    fn given_data_node_then_invisible_to_hierarchy() {
        let mut scene = Scene::new();
        scene.add_data("vol", "Volume").unwrap();
        assert!(scene.contains("vol"));
        assert!(scene.lookup("vol").is_none());
        assert!(scene.remove("vol").is_none());
        assert!(scene.contains("vol"));
        assert_eq!(scene.all_nodes().count(), 0);
    }

    #[test]
    fn given_removed_slot_when_reused_then_order_is_insertion_order() {
        let mut scene = Scene::new();
        scene.add(HierarchyNode::new("a")).unwrap();
        scene.add(HierarchyNode::new("b")).unwrap();
        scene.remove("a");
        scene.add(HierarchyNode::new("c")).unwrap();

        let ids: Vec<&str> = scene.all_nodes().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn given_tag_when_generating_ids_then_skips_taken() {
        let mut scene = Scene::new();
        scene.add(HierarchyNode::new("Hierarchy1")).unwrap();
        let id = scene
            .add_with_generated_id(HierarchyNode::new("placeholder"))
            .unwrap();
        assert_eq!(id.as_str(), "Hierarchy2");
        assert!(scene.contains("Hierarchy2"));
        assert!(!scene.contains("placeholder"));
    }

    #[test]
    fn given_rename_when_target_free_then_lookup_moves() {
        let mut scene = Scene::new();
        scene.add(HierarchyNode::new("a")).unwrap();
        scene.rename("a", NodeId::from("z")).unwrap();
        assert!(scene.lookup("a").is_none());
        assert_eq!(scene.lookup("z").unwrap().id().as_str(), "z");
    }

    #[test]
    fn given_keys_changed_after_add_when_adding_then_new_node_sorts_last() {
        let mut scene = Scene::new();
        scene.add(HierarchyNode::new("a")).unwrap();
        scene.lookup_mut("a").unwrap().set_sort_key(50.0);
        scene.mark_modified();

        scene.add(HierarchyNode::new("b")).unwrap();

        assert_eq!(scene.lookup("b").unwrap().sort_key(), 51.0);
    }

    #[test]
    fn given_explicit_max_key_when_added_then_kept() {
        let mut scene = Scene::new();
        scene.add(HierarchyNode::new("a").with_sort_key(f64::MAX)).unwrap();
        scene.add(HierarchyNode::new("b")).unwrap();

        assert_eq!(scene.lookup("a").unwrap().sort_key(), f64::MAX);
        assert_eq!(scene.lookup("b").unwrap().sort_key(), f64::MAX);
    }

    #[test]
    fn given_same_id_when_renamed_then_no_op() {
        let mut scene = Scene::new();
        scene.add(HierarchyNode::new("a")).unwrap();
        let version = scene.modification_version();

        scene.rename("a", NodeId::from("a")).unwrap();

        assert_eq!(scene.modification_version(), version);
        assert!(matches!(
            scene.rename("x", NodeId::from("x")),
            Err(DomainError::NodeNotFound(_))
        ));
    }
}
