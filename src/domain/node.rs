use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sort key reported by a node that has not been placed yet.
///
/// Placement is tracked separately, so a node may also carry this value as a
/// real key. [`Scene::add`](crate::domain::Scene::add) gives an unplaced node
/// a key that sorts after every node already in the scene.
pub const UNASSIGNED_SORT_KEY: f64 = f64::MAX;

/// Identifier of a node, unique within its owning collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A node participating in the hierarchy.
///
/// The parent is stored by identifier, not by reference: it may name a node
/// that is loaded later or has already been removed. Such a parent is treated
/// as absent during traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    id: NodeId,
    parent_id: Option<NodeId>,
    /// `None` until placed
    sort_key: Option<f64>,
}

impl HierarchyNode {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            sort_key: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_sort_key(mut self, sort_key: f64) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&NodeId> {
        self.parent_id.as_ref()
    }

    /// The assigned key, or [`UNASSIGNED_SORT_KEY`] for an unplaced node.
    pub fn sort_key(&self) -> f64 {
        self.sort_key.unwrap_or(UNASSIGNED_SORT_KEY)
    }

    /// Sets the parent reference. Callers outside [`Hierarchy`](crate::domain::Hierarchy)
    /// must invalidate the child index afterwards.
    pub fn set_parent_id(&mut self, parent_id: Option<NodeId>) {
        self.parent_id = parent_id;
    }

    /// Sets the sort key. Same invalidation contract as [`Self::set_parent_id`].
    pub fn set_sort_key(&mut self, sort_key: f64) {
        self.sort_key = Some(sort_key);
    }

    pub fn has_assigned_sort_key(&self) -> bool {
        self.sort_key.is_some()
    }

    /// Copies the hierarchy attributes of `other`. The id is owned by the
    /// collection and never copied.
    pub fn copy_from(&mut self, other: &HierarchyNode) {
        self.parent_id = other.parent_id.clone();
        self.sort_key = other.sort_key;
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }
}

impl fmt::Display for HierarchyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Payload of a node that does not take part in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNode {
    pub id: NodeId,
    /// Kind of the node, e.g. `Volume` or `Model`
    pub tag: String,
}

/// Any node held by a scene.
///
/// Only the `Hierarchy` variant is visible to the hierarchy operations; a
/// parent reference naming a data node is dangling.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Hierarchy(HierarchyNode),
    Data(DataNode),
}

impl SceneNode {
    pub fn id(&self) -> &NodeId {
        match self {
            SceneNode::Hierarchy(node) => node.id(),
            SceneNode::Data(node) => &node.id,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            SceneNode::Hierarchy(_) => "Hierarchy",
            SceneNode::Data(node) => &node.tag,
        }
    }

    pub fn as_hierarchy(&self) -> Option<&HierarchyNode> {
        match self {
            SceneNode::Hierarchy(node) => Some(node),
            SceneNode::Data(_) => None,
        }
    }

    pub fn as_hierarchy_mut(&mut self) -> Option<&mut HierarchyNode> {
        match self {
            SceneNode::Hierarchy(node) => Some(node),
            SceneNode::Data(_) => None,
        }
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        match self {
            SceneNode::Hierarchy(node) => node.set_id(id),
            SceneNode::Data(node) => node.id = id,
        }
    }
}

impl From<HierarchyNode> for SceneNode {
    fn from(node: HierarchyNode) -> Self {
        SceneNode::Hierarchy(node)
    }
}

impl From<DataNode> for SceneNode {
    fn from(node: DataNode) -> Self {
        SceneNode::Data(node)
    }
}
