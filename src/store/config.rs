//! Store-wide configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::inference::{ConflictConfig, InferenceConfig};
use crate::persistence::PersistenceConfig;

/// Configuration for a [`KnowledgeStore`](super::KnowledgeStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub persistence: PersistenceConfig,
    pub inference: InferenceConfig,
    pub conflicts: ConflictConfig,
    /// Upper bound applied to every traversal request.
    pub max_traversal_depth: usize,
    /// Entities below this confidence are reported as knowledge gaps.
    pub knowledge_gap_floor: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig::default(),
            inference: InferenceConfig::default(),
            conflicts: ConflictConfig::default(),
            max_traversal_depth: 8,
            knowledge_gap_floor: 0.5,
        }
    }
}

impl StoreConfig {
    /// Memory-only store.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store persisted under `dir` with the default flush cadence.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            persistence: PersistenceConfig::in_dir(dir),
            ..Self::default()
        }
    }

    /// Store persisted under `dir` that only writes on `force_persist`.
    pub fn for_tests(dir: impl Into<PathBuf>) -> Self {
        Self {
            persistence: PersistenceConfig::for_tests(dir),
            ..Self::default()
        }
    }

    pub fn with_persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_conflicts(mut self, conflicts: ConflictConfig) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub fn with_max_traversal_depth(mut self, depth: usize) -> Self {
        self.max_traversal_depth = depth;
        self
    }

    pub fn with_knowledge_gap_floor(mut self, floor: f64) -> Self {
        self.knowledge_gap_floor = floor.clamp(0.0, 1.0);
        self
    }
}
