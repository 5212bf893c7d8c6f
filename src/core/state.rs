// convergent, divergent, etc..
use serde::Serialize;

use crate::core::types::{ArchEdgeId, ImplEdgeId, ImplNodeId, Severity};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    Convergent, //declared AND the code contains a matching edge (happy path)
    Divergent, //code contains an edge that is undeclared, or declared forbidden
    Allowed, //no exact declaration, but an optional declared edge at the same pair tolerates the kind
    Absent, //declared BUT the code doesn't contain it
    AllowedAbsent, //declared optional/ghost/forbidden and missing, which is fine
    ImplicitlyAllowed, //covered by a declared edge between ancestors
    Unmapped, //we can't compare because mapping is missing
}

impl EdgeState {
    //violation -> (absent, divergent)
    //not a violation -> (convergent, allowed, allowedAbsent, implicitlyAllowed)
    //unmapped -> tooling or modeling debt, neither
    pub fn is_violation(&self) -> bool {
        matches!(self, EdgeState::Absent | EdgeState::Divergent)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EdgeState::Unmapped)
    }

    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            EdgeState::Allowed
                | EdgeState::AllowedAbsent
                | EdgeState::Convergent
                | EdgeState::ImplicitlyAllowed
        )
    }

    pub const ALL: [EdgeState; 7] = [
        EdgeState::Convergent,
        EdgeState::Divergent,
        EdgeState::Allowed,
        EdgeState::Absent,
        EdgeState::AllowedAbsent,
        EdgeState::ImplicitlyAllowed,
        EdgeState::Unmapped,
    ];
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Mapped, //implementation node maps to an architecture node, or architecture node has a mapped impl node
    Unmapped, //implementation node exists but has no mapping to the architecture
    SpecifiedOnly, //architecture node exists but has no mapped implementation node
}

impl NodeState {
    pub fn is_problem(&self) -> bool {
        matches!(self, NodeState::Unmapped | NodeState::SpecifiedOnly)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, NodeState::Mapped)
    }
}

/// Classification of a declared edge or of an unmatched propagated pair.
///
/// `evidence` lists the implementation edges that produced the state, sorted
/// ascending; it is empty for `Absent` and `AllowedAbsent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeRecord {
    pub state: EdgeState,
    /// `None` for conforming states.
    pub severity: Option<Severity>,
    pub evidence: Vec<ImplEdgeId>,
    /// Declared edge the classification was derived from, if any.
    pub matched: Option<ArchEdgeId>,
    /// Combined ancestor distance when the match came from lifting.
    pub lift_distance: Option<u32>,
}

impl EdgeRecord {
    pub fn is_violation(&self) -> bool {
        self.state.is_violation()
    }
}

/// An implementation edge with at least one unmapped endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmappedRecord {
    pub edge: ImplEdgeId,
    pub missing: Vec<ImplNodeId>,
    pub state: EdgeState,
    pub severity: Severity,
}

impl UnmappedRecord {
    pub fn new(edge: ImplEdgeId, missing: Vec<ImplNodeId>) -> Self {
        Self {
            edge,
            missing,
            state: EdgeState::Unmapped,
            severity: Severity::Warning,
        }
    }
}
