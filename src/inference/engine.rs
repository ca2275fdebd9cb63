//! Pairwise inference over an entity snapshot.

use std::collections::BTreeMap;

use tracing::debug;

use super::rules::{compliance, context_similarity, temporal_proximity};
use super::{InferenceConfig, SuggestedRelationship};
use crate::entity::Entity;
use crate::graph::{RelationshipGraph, Triple};

/// Candidates split by the auto-creation threshold.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutput {
    /// At or above the threshold; to be merged into the graph.
    pub auto_create: Vec<SuggestedRelationship>,
    /// Below the threshold and not already in the graph.
    pub suggested: Vec<SuggestedRelationship>,
}

/// Runs every rule over every unordered entity pair.
pub struct InferenceEngine<'a> {
    config: &'a InferenceConfig,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(config: &'a InferenceConfig) -> Self {
        Self { config }
    }

    /// Propose relationships for a snapshot.
    ///
    /// Candidates for the same triple are combined with noisy-or, so
    /// independent weak signals can add up to an automatic edge.
    pub fn infer<'e>(
        &self,
        entities: impl IntoIterator<Item = &'e Entity>,
        graph: &RelationshipGraph,
    ) -> InferenceOutput {
        let mut ordered: Vec<&Entity> = entities.into_iter().collect();
        ordered.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

        let mut candidates: BTreeMap<Triple, SuggestedRelationship> = BTreeMap::new();
        for (i, earlier) in ordered.iter().enumerate() {
            for later in &ordered[i + 1..] {
                let found = [
                    temporal_proximity(earlier, later, self.config),
                    context_similarity(earlier, later, self.config),
                    compliance(earlier, later, self.config),
                ];
                for candidate in found.into_iter().flatten() {
                    combine(&mut candidates, candidate);
                }
            }
        }

        let mut output = InferenceOutput::default();
        for candidate in candidates.into_values() {
            if candidate.confidence >= self.config.confidence_threshold {
                output.auto_create.push(candidate);
            } else if graph
                .find_link(
                    candidate.source_id,
                    candidate.target_id,
                    candidate.relationship_type,
                )
                .is_none()
            {
                output.suggested.push(candidate);
            }
        }

        output.suggested.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.source_id.cmp(&b.source_id))
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        output.suggested.truncate(self.config.max_suggestions);

        debug!(
            entities = ordered.len(),
            auto = output.auto_create.len(),
            suggested = output.suggested.len(),
            "Inference pass complete"
        );
        output
    }
}

fn combine(
    candidates: &mut BTreeMap<Triple, SuggestedRelationship>,
    candidate: SuggestedRelationship,
) {
    let key = (
        candidate.source_id,
        candidate.target_id,
        candidate.relationship_type,
    );
    match candidates.get_mut(&key) {
        Some(existing) => {
            existing.confidence = noisy_or(existing.confidence, candidate.confidence);
            existing.reasoning = format!("{}; {}", existing.reasoning, candidate.reasoning);
            for rule in candidate.rules {
                if !existing.rules.contains(&rule) {
                    existing.rules.push(rule);
                }
            }
        }
        None => {
            candidates.insert(key, candidate);
        }
    }
}

/// Probability that at least one of two independent signals holds.
pub(crate) fn noisy_or(a: f64, b: f64) -> f64 {
    (1.0 - (1.0 - a) * (1.0 - b)).clamp(0.0, 1.0)
}
