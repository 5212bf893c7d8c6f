// classification logic
use std::collections::BTreeSet;
use std::ops::ControlFlow;

use log::{debug, info, trace};

use crate::core::error::{GraphError, Result};
use crate::core::graph::{ArchEdge, ReflexionGraph};
use crate::core::lifting::LiftOutcome;
use crate::core::propagate::EdgeStateTable;
use crate::core::state::{EdgeRecord, EdgeState};
use crate::core::types::{ArchEdgeId, ImplEdgeId, PairKey, Severity};

/// Progress of a full recompute, reported after every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    pub processed: usize,
    pub total: usize,
}

/// Classify one declared edge or one propagated pair.
///
/// * `declared = Some(e)`: the declared edge `e` judged by the support found
///   on its exact key; `lift` is ignored.
/// * `declared = None`: a propagated pair with nonzero support judged by how
///   it lifted.
///
/// Pure: the same inputs always produce the same record.
pub fn classify(
    evidence: &BTreeSet<ImplEdgeId>,
    declared: Option<&ArchEdge>,
    lift: &LiftOutcome<'_>,
) -> EdgeRecord {
    let support: Vec<ImplEdgeId> = evidence.iter().copied().collect();

    if let Some(edge) = declared {
        return classify_declared(edge, support);
    }

    match *lift {
        LiftOutcome::Exact(edge) => classify_declared(edge, support),
        LiftOutcome::KindTolerant(edge) => EdgeRecord {
            state: EdgeState::Allowed,
            severity: None,
            evidence: support,
            matched: Some(edge.id),
            lift_distance: Some(0),
        },
        LiftOutcome::Ancestor { edge, distance } if edge.contract.forbidden => EdgeRecord {
            state: EdgeState::Divergent,
            severity: Some(Severity::Error),
            evidence: support,
            matched: Some(edge.id),
            lift_distance: Some(distance),
        },
        LiftOutcome::Ancestor { edge, distance } => EdgeRecord {
            state: EdgeState::ImplicitlyAllowed,
            severity: None,
            evidence: support,
            matched: Some(edge.id),
            lift_distance: Some(distance),
        },
        LiftOutcome::Internal => EdgeRecord {
            state: EdgeState::ImplicitlyAllowed,
            severity: None,
            evidence: support,
            matched: None,
            lift_distance: None,
        },
        //undeclared dependency
        LiftOutcome::Unmatched => EdgeRecord {
            state: EdgeState::Divergent,
            severity: Some(Severity::Error),
            evidence: support,
            matched: None,
            lift_distance: None,
        },
    }
}

fn classify_declared(edge: &ArchEdge, support: Vec<ImplEdgeId>) -> EdgeRecord {
    let contract = &edge.contract;

    let (state, severity, evidence) = if !support.is_empty() {
        if contract.forbidden {
            //declared forbidden and observed is always a violation
            (EdgeState::Divergent, Some(Severity::Error), support)
        } else {
            (EdgeState::Convergent, None, support)
        }
    } else if contract.tolerates_absence() {
        (EdgeState::AllowedAbsent, None, Vec::new())
    } else {
        (EdgeState::Absent, Some(contract.absent_severity()), Vec::new())
    };

    EdgeRecord {
        state,
        severity,
        evidence,
        matched: Some(edge.id),
        lift_distance: None,
    }
}

impl ReflexionGraph {
    /// Recompute the records that depend on `key`: every declared edge sitting
    /// on it and the pair finding itself.
    pub(crate) fn reclassify_key(&mut self, key: &PairKey) {
        let evidence = self
            .table
            .pairs
            .get(key)
            .map(|e| e.evidence.clone())
            .unwrap_or_default();

        let mut declared_records: Vec<(ArchEdgeId, EdgeRecord)> = Vec::new();
        for id in self.declared_at(key) {
            if let Some(edge) = self.arch_edges.get(id) {
                let record = classify(&evidence, Some(edge), &LiftOutcome::Exact(edge));
                declared_records.push((*id, record));
            }
        }

        let pair_record = if declared_records.is_empty() && !evidence.is_empty() {
            Some(classify(&evidence, None, &self.lift(key)))
        } else {
            None
        };

        trace!(
            "reclassified {key}: count={}, declared={}, pair={:?}",
            evidence.len(),
            declared_records.len(),
            pair_record.as_ref().map(|r| r.state)
        );

        for (id, record) in declared_records {
            self.table.declared.insert(id, record);
        }
        if let Some(entry) = self.table.pairs.get_mut(key) {
            entry.record = pair_record;
        }
    }

    /// Run a full reflexion analysis from scratch over the current facts.
    pub fn recompute(&mut self) -> Result<()> {
        self.recompute_with(|_| ControlFlow::Continue(()))
    }

    /// Full recompute with a progress observer.
    ///
    /// Implementation edges are propagated in ascending id order, in batches
    /// of `config.batch_size`; `observer` runs after each batch and may break
    /// to abort. Propagation happens into a staged table, so an aborted run
    /// leaves the previous classification in place.
    pub fn recompute_with<F>(&mut self, mut observer: F) -> Result<()>
    where
        F: FnMut(BuildProgress) -> ControlFlow<()>,
    {
        let mut staged = EdgeStateTable::default();
        for key in self.declared_by_key.keys() {
            staged.seed(key.clone());
        }

        let ids: Vec<ImplEdgeId> = self.impl_edges.keys().copied().collect();
        let total = ids.len();
        let mut processed = 0;

        for batch in ids.chunks(self.config.effective_batch_size()) {
            for id in batch {
                if let Some(edge) = self.impl_edges.get(id) {
                    let from = self.maps_to.get(&edge.from).copied();
                    let to = self.maps_to.get(&edge.to).copied();
                    staged.contribute(edge, from, to);
                }
            }
            processed += batch.len();

            if observer(BuildProgress { processed, total }).is_break() {
                debug!("recompute aborted at {processed}/{total} implementation edges");
                return Err(GraphError::Aborted { processed, total });
            }
        }

        let keys: Vec<PairKey> = staged.pairs.keys().cloned().collect();
        self.table = staged;
        for key in &keys {
            self.reclassify_key(key);
        }

        info!(
            "reflexion analysis complete: {} implementation edges, {} keys, {} unmapped, {} violations",
            total,
            keys.len(),
            self.table.unmapped.len(),
            self.count_violations()
        );
        Ok(())
    }

    pub fn count_violations(&self) -> usize {
        let declared = self
            .table
            .declared
            .values()
            .filter(|r| r.is_violation())
            .count();
        let pairs = self
            .table
            .pairs
            .values()
            .filter_map(|e| e.record.as_ref())
            .filter(|r| r.is_violation())
            .count();
        declared + pairs
    }

    pub fn edge_state(&self, edge: ArchEdgeId) -> Option<EdgeState> {
        self.table.declared.get(&edge).map(|r| r.state)
    }

    pub fn pair_state(&self, key: &PairKey) -> Option<EdgeState> {
        self.table
            .pairs
            .get(key)
            .and_then(|e| e.record.as_ref())
            .map(|r| r.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ReflexionConfig;
    use crate::core::graph::{ArchNode, ImplEdge, ImplNode};
    use crate::core::types::{ArchNodeId, Contract, EdgeKind, ImplNodeId};
    use crate::ir::{ArchitectureModel, ImplementationFacts, MappingModel};
    use pretty_assertions::assert_eq;

    fn ids(raw: &[u32]) -> BTreeSet<ImplEdgeId> {
        raw.iter().copied().map(ImplEdgeId).collect()
    }

    fn mk_declared(contract: Contract) -> ArchEdge {
        ArchEdge::new(100, 1, 2, EdgeKind::calls()).with_contract(contract)
    }

    // pure function first

    #[test]
    fn supported_declared_edge_is_convergent() {
        let e = mk_declared(Contract::default());
        let r = classify(&ids(&[200, 201]), Some(&e), &LiftOutcome::Exact(&e));
        assert_eq!(
            r,
            EdgeRecord {
                state: EdgeState::Convergent,
                severity: None,
                evidence: vec![ImplEdgeId(200), ImplEdgeId(201)],
                matched: Some(ArchEdgeId(100)),
                lift_distance: None,
            }
        );
    }

    #[test]
    fn forbidden_and_observed_is_divergent_error_regardless_of_severity() {
        let e = mk_declared(Contract::forbidden().with_severity(Severity::Warning));
        let r = classify(&ids(&[200]), Some(&e), &LiftOutcome::Exact(&e));
        assert_eq!(r.state, EdgeState::Divergent);
        assert_eq!(r.severity, Some(Severity::Error));
        assert_eq!(r.evidence, vec![ImplEdgeId(200)]);
    }

    #[test]
    fn unsupported_declared_edges() {
        let none = BTreeSet::new();

        let e = mk_declared(Contract::default());
        let r = classify(&none, Some(&e), &LiftOutcome::Exact(&e));
        assert_eq!((r.state, r.severity), (EdgeState::Absent, Some(Severity::Error)));
        assert!(r.evidence.is_empty());

        let e = mk_declared(Contract::default().with_severity(Severity::Warning));
        let r = classify(&none, Some(&e), &LiftOutcome::Exact(&e));
        assert_eq!((r.state, r.severity), (EdgeState::Absent, Some(Severity::Warning)));

        let e = mk_declared(Contract::must_exist());
        let r = classify(&none, Some(&e), &LiftOutcome::Exact(&e));
        assert_eq!((r.state, r.severity), (EdgeState::Absent, Some(Severity::Error)));

        let e = mk_declared(Contract::default().with_severity(Severity::Error));
        let r = classify(&none, Some(&e), &LiftOutcome::Exact(&e));
        assert_eq!((r.state, r.severity), (EdgeState::Absent, Some(Severity::Error)));

        for contract in [Contract::optional(), Contract::ghost(), Contract::forbidden()] {
            let e = mk_declared(contract);
            let r = classify(&none, Some(&e), &LiftOutcome::Exact(&e));
            assert_eq!((r.state, r.severity), (EdgeState::AllowedAbsent, None));
        }
    }

    #[test]
    fn pair_states_follow_lift_outcome() {
        let support = ids(&[300]);
        let ancestor = ArchEdge::new(7, 1, 2, EdgeKind::calls());
        let ghost = ArchEdge::new(8, 1, 2, EdgeKind::calls()).with_contract(Contract::ghost());
        let forbidden = ArchEdge::new(9, 1, 2, EdgeKind::calls()).with_contract(Contract::forbidden());
        let tolerant = ArchEdge::new(6, 1, 2, EdgeKind::reads()).with_contract(Contract::optional());

        let r = classify(&support, None, &LiftOutcome::Ancestor { edge: &ancestor, distance: 2 });
        assert_eq!(r.state, EdgeState::ImplicitlyAllowed);
        assert_eq!((r.matched, r.lift_distance), (Some(ArchEdgeId(7)), Some(2)));

        let r = classify(&support, None, &LiftOutcome::Ancestor { edge: &ghost, distance: 1 });
        assert_eq!(r.state, EdgeState::ImplicitlyAllowed);

        let r = classify(&support, None, &LiftOutcome::Ancestor { edge: &forbidden, distance: 1 });
        assert_eq!((r.state, r.severity), (EdgeState::Divergent, Some(Severity::Error)));

        let r = classify(&support, None, &LiftOutcome::KindTolerant(&tolerant));
        assert_eq!((r.state, r.matched), (EdgeState::Allowed, Some(ArchEdgeId(6))));

        let r = classify(&support, None, &LiftOutcome::Internal);
        assert_eq!((r.state, r.matched), (EdgeState::ImplicitlyAllowed, None));

        let r = classify(&support, None, &LiftOutcome::Unmatched);
        assert_eq!((r.state, r.severity), (EdgeState::Divergent, Some(Severity::Error)));
        assert_eq!(r.evidence, vec![ImplEdgeId(300)]);
    }

    #[test]
    fn classify_is_deterministic() {
        let e = mk_declared(Contract::must_exist());
        let a = classify(&ids(&[5, 3, 9]), Some(&e), &LiftOutcome::Exact(&e));
        let b = classify(&ids(&[9, 5, 3]), Some(&e), &LiftOutcome::Exact(&e));
        assert_eq!(a, b);
    }

    // whole-graph runs

    //  UI(1) -> Service(2) declared calls, DB(3) undeclared
    fn mk_facts() -> (ArchitectureModel, ImplementationFacts, MappingModel) {
        let arch = ArchitectureModel {
            nodes: vec![
                ArchNode::new(1, "UI", None),
                ArchNode::new(2, "Service", None),
                ArchNode::new(3, "DB", None),
            ],
            edges: vec![ArchEdge::new(100, 1, 2, EdgeKind::calls())],
        };
        let facts = ImplementationFacts {
            nodes: vec![
                ImplNode::new(10, "LoginPage", Some("ui/login.rs")),
                ImplNode::new(11, "UserService", Some("service/user.rs")),
                ImplNode::new(12, "DbClient", Some("db/client.rs")),
                ImplNode::new(13, "Scratch", None),
            ],
            edges: vec![
                ImplEdge::new(200, 10, 11, EdgeKind::calls()),
                ImplEdge::new(201, 10, 12, EdgeKind::calls()),
                ImplEdge::new(202, 13, 10, EdgeKind::calls()),
            ],
        };
        let mapping: MappingModel = [
            (ImplNodeId(10), ArchNodeId(1)),
            (ImplNodeId(11), ArchNodeId(2)),
            (ImplNodeId(12), ArchNodeId(3)),
        ]
        .into_iter()
        .collect();
        (arch, facts, mapping)
    }

    #[test]
    fn run_from_scratch_marks_convergent_divergent_and_unmapped() {
        let (arch, facts, mapping) = mk_facts();
        let g = ReflexionGraph::from_ir(&arch, &facts, &mapping, ReflexionConfig::default()).unwrap();

        assert_eq!(g.edge_state(ArchEdgeId(100)), Some(EdgeState::Convergent));

        let ui_db = PairKey::new(ArchNodeId(1), ArchNodeId(3), EdgeKind::calls());
        assert_eq!(g.pair_state(&ui_db), Some(EdgeState::Divergent));

        assert!(g.table().is_unmapped(ImplEdgeId(202)));
        assert_eq!(g.count_violations(), 1);
    }

    #[test]
    fn missing_impl_edge_marks_declared_edge_absent() {
        let (arch, _, mapping) = mk_facts();
        let g = ReflexionGraph::build(&arch, &mapping).unwrap();

        let r = g.table().declared(ArchEdgeId(100)).unwrap();
        assert_eq!(r.state, EdgeState::Absent);
        assert!(r.evidence.is_empty());
        assert_eq!(g.table().count(&g.arch_edge(ArchEdgeId(100)).unwrap().key()), 0);
    }

    #[test]
    fn batched_recompute_reports_progress_and_matches_single_batch() {
        let (arch, facts, mapping) = mk_facts();
        let single = ReflexionGraph::from_ir(&arch, &facts, &mapping, ReflexionConfig::default()).unwrap();

        let cfg = ReflexionConfig { batch_size: 2, ..ReflexionConfig::default() };
        let mut batched = ReflexionGraph::from_ir(&arch, &facts, &mapping, cfg).unwrap();

        let mut seen = Vec::new();
        batched
            .recompute_with(|p| {
                seen.push((p.processed, p.total));
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(seen, vec![(2, 3), (3, 3)]);
        assert_eq!(batched.table(), single.table());
    }

    #[test]
    fn aborted_recompute_keeps_previous_table() {
        let (arch, facts, mapping) = mk_facts();
        let cfg = ReflexionConfig { batch_size: 1, ..ReflexionConfig::default() };
        let mut g = ReflexionGraph::from_ir(&arch, &facts, &mapping, cfg).unwrap();
        let before = g.table().clone();

        let err = g.recompute_with(|_| ControlFlow::Break(())).unwrap_err();

        assert_eq!(err, GraphError::Aborted { processed: 1, total: 3 });
        assert_eq!(g.table(), &before);
    }
}
