//! Reflexion analysis engine.
//!
//! Combines an intended architecture (a forest of architecture nodes plus
//! declared edges with contract attributes) with implementation facts and a
//! mapping between the two, then classifies every declared edge and every
//! propagated dependency into a conformance state.
//!
//! ```text
//! impl edges ──propagate──> (A, B, kind) counts ──lift──> declared edge?
//!                                   │                          │
//!                                   └────────classify──────────┘
//!                                              │
//!                                     EdgeStateTable / report
//! ```
//!
//! Incremental mutators (`add_impl_edge`, `remove_impl_edge`,
//! `remap_impl_node`) only revisit the architecture-level keys they touch and
//! always leave the table equal to a from-scratch recompute.

pub mod core;
pub mod ir;
pub mod mapping;

pub use crate::core::classify::{BuildProgress, classify};
pub use crate::core::config::ReflexionConfig;
pub use crate::core::delta::ChangedPairs;
pub use crate::core::error::{ConfigError, GraphError, NotFoundError, Result, StructuralError};
pub use crate::core::graph::{ArchEdge, ArchNode, ImplEdge, ImplNode, ReflexionGraph};
pub use crate::core::lifting::LiftOutcome;
pub use crate::core::propagate::{Contribution, EdgeStateTable, PairEntry};
pub use crate::core::report::{ClassificationReport, DeclaredFinding, PairFinding, Summary};
pub use crate::core::state::{EdgeRecord, EdgeState, NodeState, UnmappedRecord};
pub use crate::core::types::{
    ArchEdgeId, ArchNodeId, Contract, Counter, EdgeKind, ImplEdgeId, ImplNodeId, PairKey, Severity,
};
pub use crate::ir::{ArchitectureModel, ImplementationFacts, MappingModel, MapsTo};
