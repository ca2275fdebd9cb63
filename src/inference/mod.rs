//! Relationship inference and conflict detection.
//!
//! The inference pass proposes edges nobody asked for, using three rule
//! families:
//!
//! - **Temporal proximity**: entities created close together in time
//! - **Context similarity**: overlapping technical stacks
//! - **Compliance**: deployment assessments against accepted or proposed
//!   architectural decisions on the same stack
//!
//! Candidates above [`InferenceConfig::confidence_threshold`] are created in
//! the graph; the rest are returned for review. The conflict detector runs
//! over the same snapshot and reports contradictions without acting on them.

mod conflict;
mod engine;
mod rules;

pub use conflict::{Conflict, ConflictDetector, ConflictSeverity};
pub use engine::{InferenceEngine, InferenceOutput};
pub use rules::{compliance, context_similarity, stack_overlap, temporal_proximity};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::graph::{RelationshipInput, RelationshipType};

/// Tunable constants for the inference rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InferenceConfig {
    /// Temporal proximity window, in seconds.
    pub temporal_window_secs: i64,
    /// Confidence at the edge of the window.
    pub temporal_floor: f64,
    /// Confidence for simultaneous creation.
    pub temporal_ceiling: f64,
    /// Minimum Jaccard overlap of technical stacks.
    pub min_stack_overlap: f64,
    /// Shared stack tokens that qualify a pair regardless of Jaccard overlap.
    pub min_shared_tokens: usize,
    /// Confidence floor for pairs qualified by shared tokens.
    pub shared_token_floor: f64,
    /// Candidates at or above this are created automatically.
    pub confidence_threshold: f64,
    /// Compliance weight for accepted decisions.
    pub accepted_weight: f64,
    /// Compliance weight for proposed decisions.
    pub proposed_weight: f64,
    /// Cap on returned suggestions, highest confidence first.
    pub max_suggestions: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            temporal_window_secs: 24 * 60 * 60,
            temporal_floor: 0.3,
            temporal_ceiling: 0.7,
            min_stack_overlap: 0.5,
            min_shared_tokens: 2,
            shared_token_floor: 0.4,
            confidence_threshold: 0.8,
            accepted_weight: 1.0,
            proposed_weight: 0.6,
            max_suggestions: 200,
        }
    }
}

impl InferenceConfig {
    /// Only near-certain candidates are created automatically.
    pub fn conservative() -> Self {
        Self {
            confidence_threshold: 0.95,
            min_stack_overlap: 0.6,
            min_shared_tokens: 3,
            ..Self::default()
        }
    }

    /// Shorter window and lower bar for auto-creation.
    pub fn eager() -> Self {
        Self {
            temporal_window_secs: 6 * 60 * 60,
            confidence_threshold: 0.65,
            min_stack_overlap: 0.34,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_temporal_window_secs(mut self, secs: i64) -> Self {
        self.temporal_window_secs = secs.max(1);
        self
    }
}

/// Severity thresholds for conflict detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConflictConfig {
    /// Readiness below this is a high-severity conflict.
    pub high_readiness_threshold: f64,
    /// Readiness below this is a medium-severity conflict.
    pub medium_readiness_threshold: f64,
    /// Report otherwise-ready assessments that still list blocking issues.
    pub flag_blocking_issues: bool,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            high_readiness_threshold: 0.5,
            medium_readiness_threshold: 0.75,
            flag_blocking_issues: true,
        }
    }
}

/// Rule family that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceRule {
    TemporalProximity,
    ContextSimilarity,
    Compliance,
}

/// A relationship proposed by the inference pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedRelationship {
    pub source_id: EntityId,
    pub target_id: EntityId,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub confidence: f64,
    pub reasoning: String,
    pub rules: Vec<InferenceRule>,
}

impl SuggestedRelationship {
    /// Relationship input carrying the reasoning as evidence.
    pub fn to_input(&self) -> RelationshipInput {
        RelationshipInput::new(self.source_id, self.target_id, self.relationship_type)
            .with_confidence(self.confidence)
            .with_strength(self.confidence)
            .with_evidence(self.reasoning.clone())
    }
}

/// Result of [`KnowledgeStore::create_cross_tool_relationships`](crate::KnowledgeStore::create_cross_tool_relationships).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossToolReport {
    pub suggested_relationships: Vec<SuggestedRelationship>,
    pub conflicts: Vec<Conflict>,
    pub auto_created_count: usize,
}
