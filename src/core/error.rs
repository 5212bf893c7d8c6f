//! Engine errors.
//!
//! Conformance findings (absent, divergent, unmapped, ...) are never errors;
//! they surface as classification states. Errors are reserved for malformed
//! input and references to unknown ids.

use thiserror::Error;

use crate::core::types::{ArchEdgeId, ArchNodeId, ImplEdgeId, ImplNodeId};

pub type Result<T> = std::result::Result<T, GraphError>;

/// The architecture model is not a well-formed forest with valid edges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("architecture hierarchy contains a cycle through node {node}")]
    Cycle { node: ArchNodeId },

    #[error("architecture node {node} has unknown parent {parent}")]
    DanglingParent { node: ArchNodeId, parent: ArchNodeId },

    #[error("architecture edge {edge} references unknown node {node}")]
    UnknownEndpoint { edge: ArchEdgeId, node: ArchNodeId },

    #[error("duplicate architecture node id {0}")]
    DuplicateArchNode(ArchNodeId),

    #[error("duplicate architecture edge id {0}")]
    DuplicateArchEdge(ArchEdgeId),
}

/// The mapping is inconsistent with itself or with the architecture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("implementation node {impl_node} mapped to both {first} and {second}")]
    ConflictingMapping {
        impl_node: ImplNodeId,
        first: ArchNodeId,
        second: ArchNodeId,
    },

    #[error("implementation node {impl_node} mapped to unknown architecture node {arch}")]
    UnknownMappingTarget { impl_node: ImplNodeId, arch: ArchNodeId },
}

/// An incremental operation referenced an id the graph does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("implementation edge not found: {0}")]
    ImplEdge(ImplEdgeId),

    #[error("implementation node not found: {0}")]
    ImplNode(ImplNodeId),

    #[error("architecture node not found: {0}")]
    ArchNode(ArchNodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("implementation edge {0} already exists")]
    DuplicateImplEdge(ImplEdgeId),

    /// A full recompute was stopped by its observer; the previous table is kept.
    #[error("recompute aborted after {processed} of {total} implementation edges")]
    Aborted { processed: usize, total: usize },
}
