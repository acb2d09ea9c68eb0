//! Domain layer: hierarchy nodes, the collection boundary, the child index
//! and the structural operations.
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod child_index;
pub mod collection;
pub mod error;
pub mod hierarchy;
pub mod node;
pub mod scene;

pub use child_index::ChildIndex;
pub use collection::NodeCollection;
pub use error::{DomainError, DomainResult};
pub use hierarchy::{Hierarchy, DEFAULT_SORT_KEY_STEP};
pub use node::{DataNode, HierarchyNode, NodeId, SceneNode, UNASSIGNED_SORT_KEY};
pub use scene::Scene;
