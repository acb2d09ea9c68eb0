//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod error;
pub mod error_ext;
pub mod scene_file;
pub mod services;
pub mod tree_view;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use scene_file::{NodeRecord, SceneDocument};
pub use tree_view::TreeNodeConvert;
