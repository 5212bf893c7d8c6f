//! In-memory classification report handed to the reporting layer.
//!
//! Findings are listed in ascending declared-edge id / key / implementation
//! edge id order so two reports over the same facts compare equal.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::graph::ReflexionGraph;
use crate::core::state::{EdgeRecord, EdgeState, UnmappedRecord};
use crate::core::types::{ArchEdgeId, ArchNodeId, Counter, EdgeKind, PairKey, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredFinding {
    pub edge: ArchEdgeId,
    pub from: ArchNodeId,
    pub to: ArchNodeId,
    pub kind: EdgeKind,
    pub count: Counter,
    pub record: EdgeRecord,
}

/// A propagated pair no declared edge matches exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairFinding {
    pub key: PairKey,
    pub count: Counter,
    pub record: EdgeRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub by_state: BTreeMap<EdgeState, usize>,
    pub violations: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl Summary {
    fn tally(&mut self, state: EdgeState, severity: Option<Severity>) {
        *self.by_state.entry(state).or_default() += 1;
        if state.is_violation() {
            self.violations += 1;
        }
        match severity {
            Some(Severity::Error) => self.errors += 1,
            Some(Severity::Warning) => self.warnings += 1,
            None => {}
        }
    }

    pub fn count(&self, state: EdgeState) -> usize {
        self.by_state.get(&state).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationReport {
    pub declared: Vec<DeclaredFinding>,
    pub propagated: Vec<PairFinding>,
    pub unmapped: Vec<UnmappedRecord>,
    pub summary: Summary,
}

impl ClassificationReport {
    pub fn is_conformant(&self) -> bool {
        self.summary.violations == 0
    }

    /// Every violating record, declared findings first, then propagated pairs.
    pub fn violations(&self) -> impl Iterator<Item = &EdgeRecord> + '_ {
        self.declared
            .iter()
            .map(|f| &f.record)
            .chain(self.propagated.iter().map(|f| &f.record))
            .filter(|r| r.is_violation())
    }

    pub fn declared_violations(&self) -> impl Iterator<Item = &DeclaredFinding> + '_ {
        self.declared.iter().filter(|f| f.record.is_violation())
    }

    pub fn propagated_violations(&self) -> impl Iterator<Item = &PairFinding> + '_ {
        self.propagated.iter().filter(|f| f.record.is_violation())
    }

    pub fn declared_state(&self, edge: ArchEdgeId) -> Option<EdgeState> {
        self.declared
            .iter()
            .find(|f| f.edge == edge)
            .map(|f| f.record.state)
    }
}

impl ReflexionGraph {
    pub fn report(&self) -> ClassificationReport {
        let mut summary = Summary::default();

        let declared: Vec<DeclaredFinding> = self
            .table
            .declared_records()
            .filter_map(|(id, record)| {
                let edge = self.arch_edges.get(&id)?;
                Some(DeclaredFinding {
                    edge: id,
                    from: edge.from,
                    to: edge.to,
                    kind: edge.kind.clone(),
                    count: self.table.count(&edge.key()),
                    record: record.clone(),
                })
            })
            .collect();

        let propagated: Vec<PairFinding> = self
            .table
            .pairs()
            .filter_map(|(key, entry)| {
                entry.record().map(|record| PairFinding {
                    key: key.clone(),
                    count: entry.count(),
                    record: record.clone(),
                })
            })
            .collect();

        let unmapped: Vec<UnmappedRecord> = self.table.unmapped().cloned().collect();

        for f in &declared {
            summary.tally(f.record.state, f.record.severity);
        }
        for f in &propagated {
            summary.tally(f.record.state, f.record.severity);
        }
        for u in &unmapped {
            summary.tally(u.state, Some(u.severity));
        }

        ClassificationReport {
            declared,
            propagated,
            unmapped,
            summary,
        }
    }
}
