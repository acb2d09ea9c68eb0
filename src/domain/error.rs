//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::NodeId;

/// Domain errors represent hierarchy contract violations.
/// These are independent of infrastructure concerns.
///
/// Dangling parents, out-of-range indices and cycles met during traversal are
/// not errors: queries degrade to roots, clamped positions and partial results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node is not a hierarchy node: {0}")]
    NotHierarchyNode(NodeId),

    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("invalid parent for {node}: {reason}")]
    InvalidParent { node: NodeId, reason: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
