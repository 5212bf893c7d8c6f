use std::collections::{BTreeMap, BTreeSet};

use crate::core::graph::{ImplEdge, ReflexionGraph};
use crate::core::state::{EdgeRecord, UnmappedRecord};
use crate::core::types::{ArchEdgeId, ArchNodeId, Counter, ImplEdgeId, PairKey};

/// Where an implementation edge currently contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    Pair(PairKey),
    Unmapped,
}

/// Aggregated support for one architecture-level key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairEntry {
    pub(crate) count: Counter,
    pub(crate) evidence: BTreeSet<ImplEdgeId>,
    /// Finding for the pair itself; only set when no declared edge sits on
    /// the key and the count is nonzero.
    pub(crate) record: Option<EdgeRecord>,
}

impl PairEntry {
    pub fn count(&self) -> Counter {
        self.count
    }

    pub fn evidence(&self) -> &BTreeSet<ImplEdgeId> {
        &self.evidence
    }

    pub fn record(&self) -> Option<&EdgeRecord> {
        self.record.as_ref()
    }
}

/// Derived state of the graph: propagated counts per key, one record per
/// declared edge, one record per unmapped implementation edge.
///
/// Two tables compare equal iff every count, every evidence set and every
/// classification matches, which is what the incremental path is held to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeStateTable {
    pub(crate) pairs: BTreeMap<PairKey, PairEntry>,
    pub(crate) declared: BTreeMap<ArchEdgeId, EdgeRecord>,
    pub(crate) unmapped: BTreeMap<ImplEdgeId, UnmappedRecord>,
    pub(crate) sources: BTreeMap<ImplEdgeId, Contribution>,
}

impl EdgeStateTable {
    pub fn count(&self, key: &PairKey) -> Counter {
        self.pairs.get(key).map_or(0, |e| e.count)
    }

    pub fn pair(&self, key: &PairKey) -> Option<&PairEntry> {
        self.pairs.get(key)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&PairKey, &PairEntry)> + '_ {
        self.pairs.iter()
    }

    pub fn declared(&self, edge: ArchEdgeId) -> Option<&EdgeRecord> {
        self.declared.get(&edge)
    }

    pub fn declared_records(&self) -> impl Iterator<Item = (ArchEdgeId, &EdgeRecord)> + '_ {
        self.declared.iter().map(|(&id, r)| (id, r))
    }

    pub fn unmapped(&self) -> impl Iterator<Item = &UnmappedRecord> + '_ {
        self.unmapped.values()
    }

    pub fn is_unmapped(&self, edge: ImplEdgeId) -> bool {
        self.unmapped.contains_key(&edge)
    }

    pub fn contribution(&self, edge: ImplEdgeId) -> Option<&Contribution> {
        self.sources.get(&edge)
    }

    pub(crate) fn seed(&mut self, key: PairKey) {
        self.pairs.entry(key).or_default();
    }

    /// Add one implementation edge whose endpoints resolved to `from`/`to`.
    /// Either side missing records unmapped evidence and touches no count.
    pub(crate) fn contribute(
        &mut self,
        edge: &ImplEdge,
        from: Option<ArchNodeId>,
        to: Option<ArchNodeId>,
    ) -> Option<PairKey> {
        match (from, to) {
            (Some(a), Some(b)) => {
                let key = PairKey::new(a, b, edge.kind.clone());
                let entry = self.pairs.entry(key.clone()).or_default();
                if entry.evidence.insert(edge.id) {
                    entry.count += 1;
                }
                self.sources.insert(edge.id, Contribution::Pair(key.clone()));
                Some(key)
            }
            _ => {
                let mut missing = Vec::with_capacity(2);
                if from.is_none() {
                    missing.push(edge.from);
                }
                if to.is_none() && !missing.contains(&edge.to) {
                    missing.push(edge.to);
                }
                self.unmapped
                    .insert(edge.id, UnmappedRecord::new(edge.id, missing));
                self.sources.insert(edge.id, Contribution::Unmapped);
                None
            }
        }
    }

    /// Undo whatever `edge` contributed. A key that drops to zero stays in
    /// the table only while `is_declared` says a declared edge still needs it.
    pub(crate) fn withdraw(
        &mut self,
        edge: ImplEdgeId,
        is_declared: impl Fn(&PairKey) -> bool,
    ) -> Option<PairKey> {
        match self.sources.remove(&edge)? {
            Contribution::Unmapped => {
                self.unmapped.remove(&edge);
                None
            }
            Contribution::Pair(key) => {
                if let Some(entry) = self.pairs.get_mut(&key) {
                    if entry.evidence.remove(&edge) {
                        debug_assert!(entry.count > 0, "count underflow on {key}");
                        entry.count = entry.count.saturating_sub(1);
                    }
                    if entry.count == 0 {
                        entry.record = None;
                        if !is_declared(&key) {
                            self.pairs.remove(&key);
                        }
                    }
                }
                Some(key)
            }
        }
    }
}

impl ReflexionGraph {
    /// Key the edge would propagate onto under the current mapping.
    pub fn resolve_key(&self, edge: ImplEdgeId) -> Option<PairKey> {
        let e = self.impl_edges.get(&edge)?;
        let from = self.maps_to.get(&e.from).copied()?;
        let to = self.maps_to.get(&e.to).copied()?;
        Some(PairKey::new(from, to, e.kind.clone()))
    }

    /// Propagate a single implementation edge into architecture space.
    ///
    /// Steps:
    /// 1) Map both endpoints through `maps_to`
    /// 2) Either endpoint unmapped => unmapped evidence only, no key
    /// 3) Otherwise increment the (from_arch, to_arch, kind) count and record
    ///    the edge as evidence for the key
    ///
    /// Does not reclassify; callers decide which keys to revisit.
    pub(crate) fn propagate_edge(&mut self, edge: ImplEdgeId) -> Option<PairKey> {
        let e = self.impl_edges.get(&edge)?;
        let from = self.maps_to.get(&e.from).copied();
        let to = self.maps_to.get(&e.to).copied();
        self.table.contribute(e, from, to)
    }

    pub(crate) fn retract_edge(&mut self, edge: ImplEdgeId) -> Option<PairKey> {
        let declared = &self.declared_by_key;
        self.table.withdraw(edge, |key| declared.contains_key(key))
    }
}

/*
What the tests below pin down:

    propagation is a pure aggregation: many impl edges fold onto one key,
    the count equals the number of distinct contributing edges, and taking
    them away again brings the count back to zero without going negative.

    unmapped endpoints never reach architecture space.
*/
