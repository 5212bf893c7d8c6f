// nodes, edges, the reflexion graph aggregate
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

use log::info;
use serde::{Deserialize, Serialize};

use crate::core::classify::BuildProgress;
use crate::core::config::ReflexionConfig;
use crate::core::error::{GraphError, NotFoundError, Result, StructuralError};
use crate::core::propagate::EdgeStateTable;
use crate::core::types::{
    ArchEdgeId, ArchNodeId, Contract, EdgeKind, ImplEdgeId, ImplNodeId, PairKey,
};
use crate::ir::{ArchitectureModel, ImplementationFacts, MappingModel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchNode {
    pub id: ArchNodeId,
    pub name: String,
    #[serde(default)]
    pub parent: Option<ArchNodeId>,
}

impl ArchNode {
    pub fn new<S: Into<String>>(id: u32, name: S, parent: Option<u32>) -> Self {
        Self {
            id: ArchNodeId(id),
            name: name.into(),
            parent: parent.map(ArchNodeId),
        }
    }
}

/// A declared (intended) dependency between two architecture nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchEdge {
    pub id: ArchEdgeId,
    pub from: ArchNodeId,
    pub to: ArchNodeId,
    pub kind: EdgeKind,
    #[serde(flatten)]
    pub contract: Contract,
}

impl ArchEdge {
    pub fn new(id: u32, from: u32, to: u32, kind: EdgeKind) -> Self {
        Self {
            id: ArchEdgeId(id),
            from: ArchNodeId(from),
            to: ArchNodeId(to),
            kind,
            contract: Contract::default(),
        }
    }

    pub fn with_contract(mut self, contract: Contract) -> Self {
        self.contract = contract;
        self
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(self.from, self.to, self.kind.clone())
    }
}

/// Purely descriptive; never an architecture node itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplNode {
    pub id: ImplNodeId,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

impl ImplNode {
    pub fn new<S: Into<String>>(id: u32, name: S, path: Option<&str>) -> Self {
        Self {
            id: ImplNodeId(id),
            name: name.into(),
            path: path.map(str::to_string),
        }
    }

    //registered implicitly through a mapping entry, metadata may follow later
    pub(crate) fn placeholder(id: ImplNodeId) -> Self {
        Self {
            id,
            name: id.to_string(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplEdge {
    pub id: ImplEdgeId,
    pub from: ImplNodeId,
    pub to: ImplNodeId,
    pub kind: EdgeKind,
}

impl ImplEdge {
    pub fn new(id: u32, from: u32, to: u32, kind: EdgeKind) -> Self {
        Self {
            id: ImplEdgeId(id),
            from: ImplNodeId(from),
            to: ImplNodeId(to),
            kind,
        }
    }
}

/// The architecture forest, the implementation facts, the mapping between
/// them and the derived classification table.
///
/// All mutation goes through `&mut self`, so a reader can never observe a
/// half-applied change. The graph does no locking of its own; callers that
/// share it across threads wrap it in a `Mutex`/`RwLock` or hand it to a
/// single worker.
#[derive(Debug, Clone)]
pub struct ReflexionGraph {
    pub(crate) arch_nodes: BTreeMap<ArchNodeId, ArchNode>,
    pub(crate) children: BTreeMap<ArchNodeId, Vec<ArchNodeId>>,
    pub(crate) arch_edges: BTreeMap<ArchEdgeId, ArchEdge>,
    pub(crate) declared_by_key: BTreeMap<PairKey, Vec<ArchEdgeId>>,
    pub(crate) declared_by_pair: BTreeMap<(ArchNodeId, ArchNodeId), Vec<ArchEdgeId>>,
    pub(crate) impl_nodes: BTreeMap<ImplNodeId, ImplNode>,
    pub(crate) impl_edges: BTreeMap<ImplEdgeId, ImplEdge>,
    pub(crate) impl_incident: BTreeMap<ImplNodeId, BTreeSet<ImplEdgeId>>,
    pub(crate) maps_to: BTreeMap<ImplNodeId, ArchNodeId>,
    pub(crate) table: EdgeStateTable,
    pub(crate) config: ReflexionConfig,
}

impl ReflexionGraph {
    fn empty(config: ReflexionConfig) -> Self {
        Self {
            arch_nodes: BTreeMap::new(),
            children: BTreeMap::new(),
            arch_edges: BTreeMap::new(),
            declared_by_key: BTreeMap::new(),
            declared_by_pair: BTreeMap::new(),
            impl_nodes: BTreeMap::new(),
            impl_edges: BTreeMap::new(),
            impl_incident: BTreeMap::new(),
            maps_to: BTreeMap::new(),
            table: EdgeStateTable::default(),
            config,
        }
    }

    pub fn build(architecture: &ArchitectureModel, mapping: &MappingModel) -> Result<Self> {
        Self::build_with_config(architecture, mapping, ReflexionConfig::default())
    }

    /// Validate the architecture and mapping and classify the declared edges.
    ///
    /// Fails without producing a graph when the architecture is not a forest,
    /// an edge references an unknown node, or the mapping is inconsistent.
    pub fn build_with_config(
        architecture: &ArchitectureModel,
        mapping: &MappingModel,
        config: ReflexionConfig,
    ) -> Result<Self> {
        let mut g = Self::assemble(architecture, mapping, config)?;
        g.recompute()?;
        g.log_built();
        Ok(g)
    }

    /// Build from all three IR records and classify the implementation facts
    /// in one full pass.
    pub fn from_ir(
        architecture: &ArchitectureModel,
        facts: &ImplementationFacts,
        mapping: &MappingModel,
        config: ReflexionConfig,
    ) -> Result<Self> {
        Self::from_ir_with(architecture, facts, mapping, config, |_| ControlFlow::Continue(()))
    }

    /// `from_ir` with a progress observer on the single classification pass.
    pub fn from_ir_with<F>(
        architecture: &ArchitectureModel,
        facts: &ImplementationFacts,
        mapping: &MappingModel,
        config: ReflexionConfig,
        observer: F,
    ) -> Result<Self>
    where
        F: FnMut(BuildProgress) -> ControlFlow<()>,
    {
        let mut g = Self::assemble(architecture, mapping, config)?;

        for node in &facts.nodes {
            g.add_impl_node(node.clone());
        }
        for edge in &facts.edges {
            g.register_impl_edge(edge.clone())?;
        }

        g.recompute_with(observer)?;
        g.log_built();
        Ok(g)
    }

    //validated structure and mapping, table left empty
    fn assemble(
        architecture: &ArchitectureModel,
        mapping: &MappingModel,
        config: ReflexionConfig,
    ) -> Result<Self> {
        let mut g = Self::empty(config);

        for node in &architecture.nodes {
            if g.arch_nodes.insert(node.id, node.clone()).is_some() {
                return Err(StructuralError::DuplicateArchNode(node.id).into());
            }
        }

        //parents must exist and the parent links must terminate at a root
        for node in g.arch_nodes.values() {
            if let Some(parent) = node.parent
                && !g.arch_nodes.contains_key(&parent)
            {
                return Err(StructuralError::DanglingParent { node: node.id, parent }.into());
            }
        }
        g.check_acyclic()?;

        for node in g.arch_nodes.values() {
            if let Some(parent) = node.parent {
                g.children.entry(parent).or_default().push(node.id);
            }
        }

        for edge in &architecture.edges {
            g.add_arch_edge(edge.clone())?;
        }

        g.apply_mapping(mapping)?;
        Ok(g)
    }

    fn log_built(&self) {
        info!(
            "built reflexion graph: {} architecture nodes, {} declared edges, {} mapped implementation nodes, {} implementation edges",
            self.arch_nodes.len(),
            self.arch_edges.len(),
            self.maps_to.len(),
            self.impl_edges.len()
        );
    }

    fn check_acyclic(&self) -> std::result::Result<(), StructuralError> {
        let mut rooted: BTreeSet<ArchNodeId> = BTreeSet::new();

        for &start in self.arch_nodes.keys() {
            let mut on_path = BTreeSet::new();
            let mut cursor = Some(start);

            while let Some(id) = cursor {
                if rooted.contains(&id) {
                    break;
                }
                if !on_path.insert(id) {
                    return Err(StructuralError::Cycle { node: id });
                }
                cursor = self.arch_nodes.get(&id).and_then(|n| n.parent);
            }

            rooted.extend(on_path);
        }

        Ok(())
    }

    fn add_arch_edge(&mut self, edge: ArchEdge) -> std::result::Result<(), StructuralError> {
        for node in [edge.from, edge.to] {
            if !self.arch_nodes.contains_key(&node) {
                return Err(StructuralError::UnknownEndpoint { edge: edge.id, node });
            }
        }
        if self.arch_edges.contains_key(&edge.id) {
            return Err(StructuralError::DuplicateArchEdge(edge.id));
        }

        let id = edge.id;
        insert_sorted(self.declared_by_key.entry(edge.key()).or_default(), id);
        insert_sorted(self.declared_by_pair.entry((edge.from, edge.to)).or_default(), id);
        self.arch_edges.insert(id, edge);
        Ok(())
    }

    /// Register an implementation node, or refresh its name/path if it is
    /// already known (for example through a mapping entry).
    pub fn add_impl_node(&mut self, node: ImplNode) -> Option<ImplNode> {
        self.impl_nodes.insert(node.id, node)
    }

    //insert without touching the classification table
    pub(crate) fn register_impl_edge(&mut self, edge: ImplEdge) -> Result<()> {
        for node in [edge.from, edge.to] {
            if !self.impl_nodes.contains_key(&node) {
                return Err(NotFoundError::ImplNode(node).into());
            }
        }
        if self.impl_edges.contains_key(&edge.id) {
            return Err(GraphError::DuplicateImplEdge(edge.id));
        }

        self.impl_incident.entry(edge.from).or_default().insert(edge.id);
        self.impl_incident.entry(edge.to).or_default().insert(edge.id);
        self.impl_edges.insert(edge.id, edge);
        Ok(())
    }

    pub(crate) fn unregister_impl_edge(&mut self, id: ImplEdgeId) -> Result<ImplEdge> {
        let edge = self
            .impl_edges
            .remove(&id)
            .ok_or(NotFoundError::ImplEdge(id))?;

        for node in [edge.from, edge.to] {
            if let Some(set) = self.impl_incident.get_mut(&node) {
                set.remove(&id);
                if set.is_empty() {
                    self.impl_incident.remove(&node);
                }
            }
        }
        Ok(edge)
    }

    /// Ancestor chain of `node` starting with the node itself at distance 0.
    /// Empty for unknown nodes.
    pub fn ancestors_or_self(&self, node: ArchNodeId) -> Vec<(ArchNodeId, u32)> {
        let mut chain = Vec::new();
        let mut cursor = self.arch_nodes.get(&node).map(|n| n.id);
        let mut distance = 0;

        while let Some(id) = cursor {
            chain.push((id, distance));
            distance += 1;
            cursor = self.arch_nodes.get(&id).and_then(|n| n.parent);
        }
        chain
    }

    pub fn children(&self, node: ArchNodeId) -> &[ArchNodeId] {
        self.children.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn arch_node(&self, id: ArchNodeId) -> Option<&ArchNode> {
        self.arch_nodes.get(&id)
    }

    pub fn arch_nodes(&self) -> impl Iterator<Item = &ArchNode> + '_ {
        self.arch_nodes.values()
    }

    pub fn arch_edge(&self, id: ArchEdgeId) -> Option<&ArchEdge> {
        self.arch_edges.get(&id)
    }

    pub fn arch_edges(&self) -> impl Iterator<Item = &ArchEdge> + '_ {
        self.arch_edges.values()
    }

    /// Declared edges sitting exactly on `key`, lowest id first.
    pub fn declared_at(&self, key: &PairKey) -> &[ArchEdgeId] {
        self.declared_by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Declared edges between two nodes regardless of kind, lowest id first.
    pub fn declared_between(&self, from: ArchNodeId, to: ArchNodeId) -> &[ArchEdgeId] {
        self.declared_by_pair
            .get(&(from, to))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn impl_node(&self, id: ImplNodeId) -> Option<&ImplNode> {
        self.impl_nodes.get(&id)
    }

    pub fn impl_edge(&self, id: ImplEdgeId) -> Option<&ImplEdge> {
        self.impl_edges.get(&id)
    }

    pub fn impl_edges(&self) -> impl Iterator<Item = &ImplEdge> + '_ {
        self.impl_edges.values()
    }

    pub fn impl_edge_count(&self) -> usize {
        self.impl_edges.len()
    }

    pub fn table(&self) -> &EdgeStateTable {
        &self.table
    }

    pub fn config(&self) -> &ReflexionConfig {
        &self.config
    }
}

fn insert_sorted(ids: &mut Vec<ArchEdgeId>, id: ArchEdgeId) {
    if let Err(pos) = ids.binary_search(&id) {
        ids.insert(pos, id);
    }
}
