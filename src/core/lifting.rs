// lifting/hierarchy logic
//does this propagated relationship correspond to something the architecture declares?
/*

Exact: a declared edge sits on (A, B, kind)

KindTolerant: no exact match, but an optional declared edge between A and B
              accepts other kinds at the same level

Ancestor: nearest declared edge of the same kind between ancestors-or-self
          of A and B, ranked by |A->A'| + |B->B'| then by lowest edge id

Internal: A == B, nothing declared, and the config lets internal pairs through

Unmatched: none of the above

*/
use crate::core::graph::{ArchEdge, ReflexionGraph};
use crate::core::types::{ArchEdgeId, PairKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftOutcome<'a> {
    Exact(&'a ArchEdge),
    KindTolerant(&'a ArchEdge),
    Ancestor { edge: &'a ArchEdge, distance: u32 },
    Internal,
    Unmatched,
}

impl LiftOutcome<'_> {
    pub fn matched_edge(&self) -> Option<ArchEdgeId> {
        match self {
            LiftOutcome::Exact(e) | LiftOutcome::KindTolerant(e) => Some(e.id),
            LiftOutcome::Ancestor { edge, .. } => Some(edge.id),
            LiftOutcome::Internal | LiftOutcome::Unmatched => None,
        }
    }
}

impl ReflexionGraph {
    //find the declared edge that exactly matches (from, to, kind), lowest id if several
    pub fn lift_exact(&self, key: &PairKey) -> Option<&ArchEdge> {
        self.declared_at(key)
            .first()
            .and_then(|id| self.arch_edges.get(id))
    }

    //same endpoints, different kind, tolerated by an optional (non-forbidden) declaration
    pub fn lift_kind_tolerant(&self, key: &PairKey) -> Option<&ArchEdge> {
        self.declared_between(key.from, key.to)
            .iter()
            .filter_map(|id| self.arch_edges.get(id))
            .find(|e| e.kind != key.kind && e.contract.optional && !e.contract.forbidden)
    }

    /// Nearest declared edge of `key.kind` between an ancestor-or-self of
    /// `key.from` and an ancestor-or-self of `key.to`, excluding the exact pair.
    ///
    /// Candidates are ranked by combined ancestor distance, then by declared
    /// edge id, so equal-distance candidates always resolve the same way.
    pub fn lift_hierarchy(&self, key: &PairKey) -> Option<(&ArchEdge, u32)> {
        let from_chain = self.ancestors_or_self(key.from);
        let to_chain = self.ancestors_or_self(key.to);
        let mut best: Option<(u32, ArchEdgeId)> = None;

        for &(a, da) in &from_chain {
            for &(b, db) in &to_chain {
                if da == 0 && db == 0 {
                    continue;
                }
                let candidate = PairKey::new(a, b, key.kind.clone());
                let Some(&id) = self.declared_at(&candidate).first() else {
                    continue;
                };
                let rank = (da + db, id);
                if best.is_none_or(|current| rank < current) {
                    best = Some(rank);
                }
            }
        }

        let (distance, id) = best?;
        self.arch_edges.get(&id).map(|e| (e, distance))
    }

    /// Run the lifting ladder for one propagated key.
    pub fn lift(&self, key: &PairKey) -> LiftOutcome<'_> {
        if let Some(edge) = self.lift_exact(key) {
            return LiftOutcome::Exact(edge);
        }
        if let Some(edge) = self.lift_kind_tolerant(key) {
            return LiftOutcome::KindTolerant(edge);
        }
        if let Some((edge, distance)) = self.lift_hierarchy(key) {
            return LiftOutcome::Ancestor { edge, distance };
        }
        if self.config.implicit_internal && key.is_internal() {
            return LiftOutcome::Internal;
        }
        LiftOutcome::Unmatched
    }
}
