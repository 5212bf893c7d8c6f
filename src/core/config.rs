use serde::{Deserialize, Serialize};

use crate::ir::{self, IrError};

pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Engine knobs. Every field has a default, so partial documents load fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflexionConfig {
    /// Implementation edges handled per batch during a full recompute.
    /// Progress observers run between batches.
    pub batch_size: usize,

    /// Treat dependencies inside a single architecture node as implicitly
    /// allowed when nothing in the hierarchy declares them.
    pub implicit_internal: bool,
}

impl Default for ReflexionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            implicit_internal: false,
        }
    }
}

impl ReflexionConfig {
    pub fn from_json(text: &str) -> Result<Self, IrError> {
        ir::from_json(text)
    }

    pub fn from_toon(text: &str) -> Result<Self, IrError> {
        ir::from_toon(text)
    }

    //0 would never make progress
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}
