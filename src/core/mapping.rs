// maps_to: impl node -> arch node
use std::collections::BTreeMap;

use crate::core::error::ConfigError;
use crate::core::graph::{ImplNode, ReflexionGraph};
use crate::core::state::NodeState;
use crate::core::types::{ArchNodeId, ImplNodeId};
use crate::ir::MappingModel;

impl ReflexionGraph {
    //1. each impl node maps to at most one arch node; listing the same pair twice is idempotent
    //2. many impl nodes may map to the same arch node (normal)
    //3. targets must be architecture nodes of this graph
    //4. all-or-nothing: a rejected mapping leaves maps_to untouched
    pub(crate) fn apply_mapping(&mut self, mapping: &MappingModel) -> Result<(), ConfigError> {
        let mut staged: BTreeMap<ImplNodeId, ArchNodeId> = BTreeMap::new();

        for entry in &mapping.maps_to {
            if !self.arch_nodes.contains_key(&entry.arch) {
                return Err(ConfigError::UnknownMappingTarget {
                    impl_node: entry.impl_node,
                    arch: entry.arch,
                });
            }

            match staged.get(&entry.impl_node).copied() {
                None => {
                    staged.insert(entry.impl_node, entry.arch);
                }
                Some(old_arch) if old_arch == entry.arch => {}
                Some(old_arch) => {
                    return Err(ConfigError::ConflictingMapping {
                        impl_node: entry.impl_node,
                        first: old_arch,
                        second: entry.arch,
                    });
                }
            }
        }

        for (impl_node, arch) in staged {
            self.impl_nodes
                .entry(impl_node)
                .or_insert_with(|| ImplNode::placeholder(impl_node));
            self.maps_to.insert(impl_node, arch);
        }
        Ok(())
    }

    /// `None` when the node is unmapped or unknown.
    pub fn mapped_arch(&self, impl_node: ImplNodeId) -> Option<ArchNodeId> {
        self.maps_to.get(&impl_node).copied()
    }

    pub fn is_mapped(&self, impl_node: ImplNodeId) -> bool {
        self.maps_to.contains_key(&impl_node)
    }

    pub fn mapping_len(&self) -> usize {
        self.maps_to.len()
    }

    //for reports
    pub fn iter_mapping(&self) -> impl Iterator<Item = (ImplNodeId, ArchNodeId)> + '_ {
        self.maps_to.iter().map(|(&i, &a)| (i, a))
    }

    /// Snapshot of the current mapping in IR form.
    pub fn mapping_model(&self) -> MappingModel {
        self.iter_mapping().collect()
    }

    pub fn unmapped_impl_nodes(&self) -> impl Iterator<Item = ImplNodeId> + '_ {
        self.impl_nodes
            .keys()
            .copied()
            .filter(|id| !self.maps_to.contains_key(id))
    }

    pub fn impl_node_state(&self, impl_node: ImplNodeId) -> Option<NodeState> {
        if !self.impl_nodes.contains_key(&impl_node) {
            return None;
        }
        Some(if self.is_mapped(impl_node) {
            NodeState::Mapped
        } else {
            NodeState::Unmapped
        })
    }

    /// `SpecifiedOnly` when no implementation node maps directly onto `arch`.
    pub fn arch_node_state(&self, arch: ArchNodeId) -> Option<NodeState> {
        if !self.arch_nodes.contains_key(&arch) {
            return None;
        }
        Some(if self.maps_to.values().any(|&a| a == arch) {
            NodeState::Mapped
        } else {
            NodeState::SpecifiedOnly
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GraphError;
    use crate::core::graph::ArchNode;
    use crate::ir::ArchitectureModel;

    fn mk_graph(mapping: &MappingModel) -> Result<ReflexionGraph, GraphError> {
        let arch = ArchitectureModel {
            nodes: vec![ArchNode::new(1, "arch1", None), ArchNode::new(2, "arch2", None)],
            edges: vec![],
        };
        ReflexionGraph::build(&arch, mapping)
    }

    #[test]
    fn mapping_insert_and_lookup_and_unmapped_none() {
        let mapping: MappingModel = [
            (ImplNodeId(10), ArchNodeId(1)),
            (ImplNodeId(11), ArchNodeId(2)),
        ]
        .into_iter()
        .collect();
        let mut g = mk_graph(&mapping).unwrap();
        g.add_impl_node(ImplNode::new(12, "impl3", None));

        assert_eq!(g.mapped_arch(ImplNodeId(10)), Some(ArchNodeId(1)));
        assert_eq!(g.mapped_arch(ImplNodeId(11)), Some(ArchNodeId(2)));
        assert_eq!(g.mapped_arch(ImplNodeId(12)), None);

        assert!(g.is_mapped(ImplNodeId(10)));
        assert!(!g.is_mapped(ImplNodeId(12)));
        assert_eq!(g.unmapped_impl_nodes().collect::<Vec<_>>(), vec![ImplNodeId(12)]);
        assert_eq!(g.mapping_len(), 2);
    }

    #[test]
    fn identical_duplicate_entries_are_idempotent() {
        let mut mapping = MappingModel::default();
        mapping.push(ImplNodeId(10), ArchNodeId(1));
        mapping.push(ImplNodeId(10), ArchNodeId(1));

        let g = mk_graph(&mapping).unwrap();
        assert_eq!(g.iter_mapping().collect::<Vec<_>>(), vec![(ImplNodeId(10), ArchNodeId(1))]);
    }

    #[test]
    fn mapping_rejects_unknown_target() {
        let mut mapping = MappingModel::default();
        mapping.push(ImplNodeId(10), ArchNodeId(42));

        let err = mk_graph(&mapping).unwrap_err();
        assert_eq!(
            err,
            GraphError::Config(ConfigError::UnknownMappingTarget {
                impl_node: ImplNodeId(10),
                arch: ArchNodeId(42),
            })
        );
    }

    #[test]
    fn node_states_follow_mapping() {
        let mapping: MappingModel = [(ImplNodeId(10), ArchNodeId(1))].into_iter().collect();
        let mut g = mk_graph(&mapping).unwrap();
        g.add_impl_node(ImplNode::new(11, "orphan", None));

        assert_eq!(g.impl_node_state(ImplNodeId(10)), Some(NodeState::Mapped));
        assert_eq!(g.impl_node_state(ImplNodeId(11)), Some(NodeState::Unmapped));
        assert_eq!(g.impl_node_state(ImplNodeId(99)), None);
        assert_eq!(g.arch_node_state(ArchNodeId(1)), Some(NodeState::Mapped));
        assert_eq!(g.arch_node_state(ArchNodeId(2)), Some(NodeState::SpecifiedOnly));
    }
}
