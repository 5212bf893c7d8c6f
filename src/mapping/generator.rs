/*
Inputs:

    impl nodes (facts)

    mapping rules: glob pattern over the normalized identity -> arch node, with priority

    optional manual overrides

Outputs:

    maps_to: BTreeMap<ImplNodeId, ArchNodeId>

    unmapped impl nodes

    mapping report (one traceable decision per impl node)

Responsibilities:

    Normalize identities (paths, or names when there is no path)

    Apply rules deterministically

    Resolve conflicts: override > highest priority > earliest rule

    Produce stable, reproducible results
*/
use std::collections::{BTreeMap, BTreeSet};

use globset::{Glob, GlobMatcher};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::graph::ImplNode;
use crate::core::types::{ArchNodeId, ImplNodeId};
use crate::ir::MappingModel;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("mapping rule {index} has invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    pub pattern: String,
    pub target: ArchNodeId,
    #[serde(default)]
    pub priority: i32,
}

impl MappingRule {
    pub fn new<S: Into<String>>(pattern: S, target: u32) -> Self {
        Self {
            pattern: pattern.into(),
            target: ArchNodeId(target),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Resolution {
    Override { target: ArchNodeId },
    Rule {
        rule: usize,
        target: ArchNodeId,
        /// Equal-priority rules that also matched but lost to an earlier one.
        shadowed: Vec<usize>,
    },
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingDecision {
    pub node: ImplNodeId,
    pub identity: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedMapping {
    pub maps_to: BTreeMap<ImplNodeId, ArchNodeId>,
    pub unmapped: BTreeSet<ImplNodeId>,
    pub report: Vec<MappingDecision>,
}

impl GeneratedMapping {
    pub fn into_mapping(self) -> MappingModel {
        self.maps_to.into()
    }
}

pub struct MappingGenerator {
    rules: Vec<(MappingRule, GlobMatcher)>,
    overrides: BTreeMap<ImplNodeId, ArchNodeId>,
}

impl MappingGenerator {
    pub fn new(rules: Vec<MappingRule>) -> Result<Self, GeneratorError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (index, rule) in rules.into_iter().enumerate() {
            let matcher = Glob::new(&rule.pattern)
                .map_err(|e| GeneratorError::InvalidPattern {
                    index,
                    pattern: rule.pattern.clone(),
                    reason: e.to_string(),
                })?
                .compile_matcher();
            compiled.push((rule, matcher));
        }

        Ok(Self {
            rules: compiled,
            overrides: BTreeMap::new(),
        })
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<ImplNodeId, ArchNodeId>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Map every node; nodes are visited in id order so the report is stable.
    pub fn generate<'a, I>(&self, nodes: I) -> GeneratedMapping
    where
        I: IntoIterator<Item = &'a ImplNode>,
    {
        let mut ordered: Vec<&ImplNode> = nodes.into_iter().collect();
        ordered.sort_by_key(|n| n.id);
        ordered.dedup_by_key(|n| n.id);

        let mut out = GeneratedMapping::default();
        for node in ordered {
            let identity = normalize_identity(node);
            let resolution = self.resolve(node.id, &identity);

            match &resolution {
                Resolution::Override { target } | Resolution::Rule { target, .. } => {
                    out.maps_to.insert(node.id, *target);
                }
                Resolution::NoMatch => {
                    out.unmapped.insert(node.id);
                }
            }
            out.report.push(MappingDecision {
                node: node.id,
                identity,
                resolution,
            });
        }

        debug!(
            "generated mapping: {} mapped, {} unmapped",
            out.maps_to.len(),
            out.unmapped.len()
        );
        out
    }

    fn resolve(&self, node: ImplNodeId, identity: &str) -> Resolution {
        if let Some(&target) = self.overrides.get(&node) {
            return Resolution::Override { target };
        }

        let matching: Vec<(usize, &MappingRule)> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, (_, m))| m.is_match(identity))
            .map(|(i, (r, _))| (i, r))
            .collect();

        let Some(top) = matching.iter().map(|(_, r)| r.priority).max() else {
            return Resolution::NoMatch;
        };

        let mut winners = matching.iter().filter(|(_, r)| r.priority == top);
        let Some(&(rule, chosen)) = winners.next() else {
            return Resolution::NoMatch;
        };

        Resolution::Rule {
            rule,
            target: chosen.target,
            shadowed: winners.map(|(i, _)| *i).collect(),
        }
    }
}

/// Path when there is one, else the name; `\` separators become `/` and a
/// leading `./` is dropped.
pub fn normalize_identity(node: &ImplNode) -> String {
    let raw = node.path.as_deref().unwrap_or(&node.name);
    let unified = raw.replace('\\', "/");
    let trimmed = unified.trim_start_matches("./");
    trimmed.to_string()
}
