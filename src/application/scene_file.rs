//! Scene documents: TOML representation of a scene.
//!
//! ```toml
//! [[node]]
//! kind = "hierarchy"
//! id = "Models"
//! sort_key = 1.0
//!
//! [[node]]
//! kind = "hierarchy"
//! id = "Skull"
//! parent = "Models"
//!
//! [[node]]
//! kind = "data"
//! id = "CT"
//! tag = "Volume"
//! ```
//!
//! Node order in the file is the scene's collection order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{DataNode, HierarchyNode, NodeId, Scene, SceneNode};

/// One `[[node]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeRecord {
    Hierarchy {
        id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<NodeId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sort_key: Option<f64>,
    },
    Data {
        id: NodeId,
        tag: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeRecord>,
}

impl SceneDocument {
    pub fn parse(content: &str, path: &Path) -> ApplicationResult<Self> {
        toml::from_str(content).map_err(|e| ApplicationError::SceneDocument {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn to_toml(&self) -> ApplicationResult<String> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::OperationFailed {
            context: "serialize scene".to_string(),
            source: Box::new(e),
        })
    }

    /// Build a scene, rejecting duplicate ids.
    pub fn into_scene(self) -> ApplicationResult<Scene> {
        let mut scene = Scene::new();
        for record in self.nodes {
            let node: SceneNode = match record {
                NodeRecord::Hierarchy {
                    id,
                    parent,
                    sort_key,
                } => {
                    let mut node = HierarchyNode::new(id);
                    node.set_parent_id(parent);
                    if let Some(key) = sort_key {
                        node.set_sort_key(key);
                    }
                    node.into()
                }
                NodeRecord::Data { id, tag } => DataNode { id, tag }.into(),
            };
            scene.add(node)?;
        }
        Ok(scene)
    }

    pub fn from_scene(scene: &Scene) -> Self {
        let nodes = scene
            .iter()
            .map(|node| match node {
                SceneNode::Hierarchy(h) => NodeRecord::Hierarchy {
                    id: h.id().clone(),
                    parent: h.parent_id().cloned(),
                    sort_key: Some(h.sort_key()),
                },
                SceneNode::Data(d) => NodeRecord::Data {
                    id: d.id.clone(),
                    tag: d.tag.clone(),
                },
            })
            .collect();
        Self { nodes }
    }
}
