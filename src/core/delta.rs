// incremental diffs
use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::core::error::{NotFoundError, Result};
use crate::core::graph::{ImplEdge, ReflexionGraph};
use crate::core::types::{ArchNodeId, Counter, ImplEdgeId, ImplNodeId, PairKey};

/// Architecture-level keys whose propagated count changed during a mutation.
pub type ChangedPairs = BTreeSet<PairKey>;

impl ReflexionGraph {
    /// Add an implementation edge and reclassify the one key it lands on.
    ///
    /// Both endpoints must already be registered (through `add_impl_node` or
    /// a mapping entry). An edge with an unmapped endpoint only records
    /// unmapped evidence and changes no count.
    pub fn add_impl_edge(&mut self, edge: ImplEdge) -> Result<ChangedPairs> {
        let id = edge.id;
        self.register_impl_edge(edge)?;

        let mut changed = ChangedPairs::new();
        if let Some(key) = self.propagate_edge(id) {
            self.reclassify_key(&key);
            changed.insert(key);
        }

        debug!("added implementation edge {id}, changed keys: {}", changed.len());
        Ok(changed)
    }

    /// Remove an implementation edge and reclassify the key it supported.
    ///
    /// Unknown ids are rejected with `NotFoundError` before anything changes,
    /// so removing the same edge twice changes the graph only once.
    pub fn remove_impl_edge(&mut self, id: ImplEdgeId) -> Result<ChangedPairs> {
        if !self.impl_edges.contains_key(&id) {
            return Err(NotFoundError::ImplEdge(id).into());
        }

        let key = self.retract_edge(id);
        self.unregister_impl_edge(id)?;

        let mut changed = ChangedPairs::new();
        if let Some(key) = key {
            self.reclassify_key(&key);
            changed.insert(key);
        }

        debug!("removed implementation edge {id}, changed keys: {}", changed.len());
        Ok(changed)
    }

    /// Point `node` at a different architecture node, or unmap it with `None`.
    ///
    /// Every implementation edge touching `node` is withdrawn under the old
    /// mapping and propagated again under the new one; every key touched
    /// either way is reclassified. Only keys whose count actually moved are
    /// returned.
    pub fn remap_impl_node(
        &mut self,
        node: ImplNodeId,
        target: Option<ArchNodeId>,
    ) -> Result<ChangedPairs> {
        if !self.impl_nodes.contains_key(&node) {
            return Err(NotFoundError::ImplNode(node).into());
        }
        if let Some(arch) = target
            && !self.arch_nodes.contains_key(&arch)
        {
            return Err(NotFoundError::ArchNode(arch).into());
        }
        if self.maps_to.get(&node).copied() == target {
            return Ok(ChangedPairs::new());
        }

        let incident: Vec<ImplEdgeId> = self
            .impl_incident
            .get(&node)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        //counts before the first touch of each key
        let mut before: BTreeMap<PairKey, Counter> = BTreeMap::new();
        let mut touched = BTreeSet::new();

        for &id in &incident {
            if let Some(key) = self.resolve_key(id) {
                before.entry(key.clone()).or_insert_with(|| self.table.count(&key));
            }
            if let Some(key) = self.retract_edge(id) {
                touched.insert(key);
            }
        }

        match target {
            Some(arch) => {
                self.maps_to.insert(node, arch);
            }
            None => {
                self.maps_to.remove(&node);
            }
        }

        for &id in &incident {
            if let Some(key) = self.resolve_key(id) {
                before.entry(key.clone()).or_insert_with(|| self.table.count(&key));
            }
            if let Some(key) = self.propagate_edge(id) {
                touched.insert(key);
            }
        }

        for key in &touched {
            self.reclassify_key(key);
        }

        let changed: ChangedPairs = touched
            .into_iter()
            .filter(|key| before.get(key).copied().unwrap_or(0) != self.table.count(key))
            .collect();

        debug!(
            "remapped implementation node {node} to {:?}: {} incident edges, {} changed keys",
            target,
            incident.len(),
            changed.len()
        );
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GraphError;
    use crate::core::graph::{ArchEdge, ArchNode, ImplNode};
    use crate::core::state::EdgeState;
    use crate::core::types::{ArchEdgeId, EdgeKind};
    use crate::ir::{ArchitectureModel, MappingModel};
    use pretty_assertions::assert_eq;

    fn mk_edge(id: u32, from: u32, to: u32) -> ImplEdge {
        ImplEdge::new(id, from, to, EdgeKind::depends_on())
    }

    // UI(1) -> Service(2) declared, Other(3) free; LoginPage(10) -> UI, UserService(11) -> Service
    fn mk_graph() -> ReflexionGraph {
        let arch = ArchitectureModel {
            nodes: vec![
                ArchNode::new(1, "UI", None),
                ArchNode::new(2, "Service", None),
                ArchNode::new(3, "Other", None),
            ],
            edges: vec![ArchEdge::new(100, 1, 2, EdgeKind::depends_on())],
        };
        let mapping: MappingModel = [
            (ImplNodeId(10), ArchNodeId(1)),
            (ImplNodeId(11), ArchNodeId(2)),
        ]
        .into_iter()
        .collect();
        let mut g = ReflexionGraph::build(&arch, &mapping).unwrap();
        g.add_impl_node(ImplNode::new(12, "Helper", None));
        g
    }

    fn key(from: u32, to: u32) -> PairKey {
        PairKey::new(ArchNodeId(from), ArchNodeId(to), EdgeKind::depends_on())
    }

    fn assert_matches_scratch(g: &ReflexionGraph) {
        let mut fresh = g.clone();
        fresh.recompute().unwrap();
        assert_eq!(g.table(), fresh.table());
    }

    #[test]
    fn incremental_add_then_remove_restores_previous_classification() {
        let mut g = mk_graph();
        g.add_impl_edge(mk_edge(200, 10, 11)).unwrap();
        assert_eq!(g.edge_state(ArchEdgeId(100)), Some(EdgeState::Convergent));
        let baseline = g.table().clone();

        //add a divergent impl edge (reverse direction)
        let changed = g.add_impl_edge(mk_edge(201, 11, 10)).unwrap();
        assert_eq!(changed, ChangedPairs::from([key(2, 1)]));
        assert_eq!(g.pair_state(&key(2, 1)), Some(EdgeState::Divergent));
        assert_matches_scratch(&g);

        //remove it and ensure we're back to baseline
        g.remove_impl_edge(ImplEdgeId(201)).unwrap();
        assert_eq!(g.table(), &baseline);
    }

    #[test]
    fn add_rejects_unknown_endpoint_and_duplicate_id() {
        let mut g = mk_graph();
        assert_eq!(
            g.add_impl_edge(mk_edge(200, 10, 99)).unwrap_err(),
            GraphError::NotFound(NotFoundError::ImplNode(ImplNodeId(99)))
        );
        assert!(g.impl_edge(ImplEdgeId(200)).is_none());

        g.add_impl_edge(mk_edge(200, 10, 11)).unwrap();
        assert_eq!(
            g.add_impl_edge(mk_edge(200, 11, 10)).unwrap_err(),
            GraphError::DuplicateImplEdge(ImplEdgeId(200))
        );
        assert_eq!(g.table().count(&key(1, 2)), 1);
    }

    #[test]
    fn second_removal_is_not_found_and_changes_nothing() {
        let mut g = mk_graph();
        g.add_impl_edge(mk_edge(200, 10, 11)).unwrap();

        let changed = g.remove_impl_edge(ImplEdgeId(200)).unwrap();
        assert_eq!(changed, ChangedPairs::from([key(1, 2)]));
        let after_first = g.table().clone();

        let err = g.remove_impl_edge(ImplEdgeId(200)).unwrap_err();
        assert_eq!(err, GraphError::NotFound(NotFoundError::ImplEdge(ImplEdgeId(200))));
        assert_eq!(g.table(), &after_first);
        assert_eq!(g.table().count(&key(1, 2)), 0);
    }

    #[test]
    fn unmapped_edge_changes_no_pair() {
        let mut g = mk_graph();
        let changed = g.add_impl_edge(mk_edge(201, 12, 10)).unwrap();

        assert!(changed.is_empty());
        assert!(g.table().is_unmapped(ImplEdgeId(201)));

        let changed = g.remove_impl_edge(ImplEdgeId(201)).unwrap();
        assert!(changed.is_empty());
        assert!(!g.table().is_unmapped(ImplEdgeId(201)));
    }

    #[test]
    fn remap_moves_support_between_keys() {
        let mut g = mk_graph();
        g.add_impl_edge(mk_edge(200, 10, 11)).unwrap();
        g.add_impl_edge(mk_edge(201, 12, 11)).unwrap();

        // Helper(12) becomes part of UI: 201 now supports UI -> Service too
        let changed = g.remap_impl_node(ImplNodeId(12), Some(ArchNodeId(1))).unwrap();
        assert_eq!(changed, ChangedPairs::from([key(1, 2)]));
        assert_eq!(g.table().count(&key(1, 2)), 2);
        assert!(!g.table().is_unmapped(ImplEdgeId(201)));
        assert_matches_scratch(&g);

        // LoginPage(10) moves to Other: UI -> Service keeps 201, Other -> Service appears
        let changed = g.remap_impl_node(ImplNodeId(10), Some(ArchNodeId(3))).unwrap();
        assert_eq!(changed, ChangedPairs::from([key(1, 2), key(3, 2)]));
        assert_eq!(g.pair_state(&key(3, 2)), Some(EdgeState::Divergent));
        assert_eq!(g.edge_state(ArchEdgeId(100)), Some(EdgeState::Convergent));
        assert_matches_scratch(&g);

        // unmapping UserService(11) drains everything into unmapped evidence
        let changed = g.remap_impl_node(ImplNodeId(11), None).unwrap();
        assert_eq!(changed, ChangedPairs::from([key(1, 2), key(3, 2)]));
        assert_eq!(g.edge_state(ArchEdgeId(100)), Some(EdgeState::Absent));
        assert!(g.table().pair(&key(3, 2)).is_none());
        assert_eq!(g.table().unmapped().count(), 2);
        assert_matches_scratch(&g);
    }

    #[test]
    fn remap_with_net_zero_count_is_reclassified_but_not_reported() {
        let mut g = mk_graph();
        g.remap_impl_node(ImplNodeId(12), Some(ArchNodeId(1))).unwrap();
        g.add_impl_edge(mk_edge(200, 10, 11)).unwrap();
        g.add_impl_edge(mk_edge(201, 12, 10)).unwrap();
        assert_eq!(g.table().declared(ArchEdgeId(100)).unwrap().evidence, vec![ImplEdgeId(200)]);

        // LoginPage(10) moves to Service: 200 leaves UI -> Service, 201 enters it
        let changed = g.remap_impl_node(ImplNodeId(10), Some(ArchNodeId(2))).unwrap();

        assert_eq!(changed, ChangedPairs::from([key(1, 1), key(2, 2)]));
        assert_eq!(g.table().count(&key(1, 2)), 1);
        let record = g.table().declared(ArchEdgeId(100)).unwrap();
        assert_eq!(record.state, EdgeState::Convergent);
        assert_eq!(record.evidence, vec![ImplEdgeId(201)]);
        assert_matches_scratch(&g);
    }

    #[test]
    fn remap_to_current_target_is_a_no_op() {
        let mut g = mk_graph();
        g.add_impl_edge(mk_edge(200, 10, 11)).unwrap();
        let before = g.table().clone();

        let changed = g.remap_impl_node(ImplNodeId(10), Some(ArchNodeId(1))).unwrap();
        assert!(changed.is_empty());
        assert_eq!(g.table(), &before);
    }

    #[test]
    fn remap_rejects_unknown_ids_without_mutation() {
        let mut g = mk_graph();
        g.add_impl_edge(mk_edge(200, 10, 11)).unwrap();
        let before = g.table().clone();

        assert_eq!(
            g.remap_impl_node(ImplNodeId(77), Some(ArchNodeId(1))).unwrap_err(),
            GraphError::NotFound(NotFoundError::ImplNode(ImplNodeId(77)))
        );
        assert_eq!(
            g.remap_impl_node(ImplNodeId(10), Some(ArchNodeId(42))).unwrap_err(),
            GraphError::NotFound(NotFoundError::ArchNode(ArchNodeId(42)))
        );
        assert_eq!(g.mapped_arch(ImplNodeId(10)), Some(ArchNodeId(1)));
        assert_eq!(g.table(), &before);
    }

    #[test]
    fn self_loop_remap_moves_one_contribution() {
        let mut g = mk_graph();
        g.add_impl_edge(mk_edge(200, 10, 10)).unwrap();
        assert_eq!(g.table().count(&key(1, 1)), 1);

        let changed = g.remap_impl_node(ImplNodeId(10), Some(ArchNodeId(3))).unwrap();
        assert_eq!(changed, ChangedPairs::from([key(1, 1), key(3, 3)]));
        assert_eq!(g.table().count(&key(3, 3)), 1);
        assert!(g.table().pair(&key(1, 1)).is_none());
        assert_matches_scratch(&g);
    }
}
