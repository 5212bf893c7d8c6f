//! IR records exchanged with the surrounding tooling.
//!
//! The shapes follow the canonical JSON used by the architecture compiler,
//! the extractors and the mapping evaluator:
//!
//! ```text
//! architecture: { nodes: [{id, name, parent}], edges: [{id, from, to, kind, optional?, must_exist?, forbidden?, ghost?, severity?}] }
//! facts:        { nodes: [{id, name, path}],   edges: [{id, from, to, kind}] }
//! mapping:      { maps_to: [{impl, arch}] }
//! ```
//!
//! The same records decode from TOON text, which the extractors emit as
//! `facts.toon` / `spec.toon`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::graph::{ArchEdge, ArchNode, ImplEdge, ImplNode};
use crate::core::types::{ArchNodeId, ImplNodeId};

#[derive(Debug, Error)]
pub enum IrError {
    #[error("invalid JSON IR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOON IR: {0}")]
    Toon(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureModel {
    #[serde(default)]
    pub nodes: Vec<ArchNode>,
    #[serde(default)]
    pub edges: Vec<ArchEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationFacts {
    #[serde(default)]
    pub nodes: Vec<ImplNode>,
    #[serde(default)]
    pub edges: Vec<ImplEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapsTo {
    #[serde(rename = "impl")]
    pub impl_node: ImplNodeId,
    pub arch: ArchNodeId,
}

/// Mapping as delivered, kept as a list so conflicting entries can be reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingModel {
    #[serde(default)]
    pub maps_to: Vec<MapsTo>,
}

impl MappingModel {
    pub fn push(&mut self, impl_node: ImplNodeId, arch: ArchNodeId) {
        self.maps_to.push(MapsTo { impl_node, arch });
    }
}

// rule-derived mappings arrive as a plain map and cannot conflict
impl From<BTreeMap<ImplNodeId, ArchNodeId>> for MappingModel {
    fn from(map: BTreeMap<ImplNodeId, ArchNodeId>) -> Self {
        Self {
            maps_to: map
                .into_iter()
                .map(|(impl_node, arch)| MapsTo { impl_node, arch })
                .collect(),
        }
    }
}

impl FromIterator<(ImplNodeId, ArchNodeId)> for MappingModel {
    fn from_iter<I: IntoIterator<Item = (ImplNodeId, ArchNodeId)>>(iter: I) -> Self {
        Self {
            maps_to: iter
                .into_iter()
                .map(|(impl_node, arch)| MapsTo { impl_node, arch })
                .collect(),
        }
    }
}

pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, IrError> {
    Ok(serde_json::from_str(text)?)
}

pub fn from_toon<T: DeserializeOwned>(text: &str) -> Result<T, IrError> {
    toon_format::decode_default(text).map_err(|e| IrError::Toon(e.to_string()))
}
