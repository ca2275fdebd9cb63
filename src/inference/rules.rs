//! Pairwise inference rules.
//!
//! Each rule looks at one ordered pair `(earlier, later)` and returns at most
//! one candidate. Pairs are ordered by `(created, id)` so the same pair always
//! yields the same direction for undirected types.

use chrono::Duration;

use super::{InferenceConfig, InferenceRule, SuggestedRelationship};
use crate::entity::{DecisionStatus, Entity, EntityKind};
use crate::graph::RelationshipType;

/// Jaccard overlap of two entities' technical stacks, with the shared tokens.
///
/// Returns `None` when either stack is empty.
pub fn stack_overlap(a: &Entity, b: &Entity) -> Option<(f64, Vec<String>)> {
    let left = a.context.stack_tokens();
    let right = b.context.stack_tokens();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    let shared: Vec<String> = left.intersection(&right).cloned().collect();
    let union = left.union(&right).count();
    Some((shared.len() as f64 / union as f64, shared))
}

/// Entities created within the configured window of each other.
pub fn temporal_proximity(
    earlier: &Entity,
    later: &Entity,
    config: &InferenceConfig,
) -> Option<SuggestedRelationship> {
    let window = config.temporal_window_secs.max(1);
    let elapsed = (later.created - earlier.created).num_seconds().abs();
    if elapsed > window {
        return None;
    }

    let closeness = 1.0 - elapsed as f64 / window as f64;
    let confidence =
        config.temporal_floor + (config.temporal_ceiling - config.temporal_floor) * closeness;

    let (source, target, relationship_type) =
        match (earlier.kind(), later.kind()) {
            (EntityKind::EnvironmentSnapshot, k) if k.is_environment_event() => {
                (later, earlier, RelationshipType::OccurredIn)
            }
            (k, EntityKind::EnvironmentSnapshot) if k.is_environment_event() => {
                (earlier, later, RelationshipType::OccurredIn)
            }
            _ => (earlier, later, RelationshipType::RelatesTo),
        };

    Some(SuggestedRelationship {
        source_id: source.id,
        target_id: target.id,
        relationship_type,
        confidence: confidence.clamp(0.0, 1.0),
        reasoning: format!(
            "Created {} apart, within the {}h proximity window",
            format_elapsed(Duration::seconds(elapsed)),
            window / 3600
        ),
        rules: vec![InferenceRule::TemporalProximity],
    })
}

/// Entities whose technical stacks overlap enough.
pub fn context_similarity(
    earlier: &Entity,
    later: &Entity,
    config: &InferenceConfig,
) -> Option<SuggestedRelationship> {
    let (overlap, shared) = stack_overlap(earlier, later)?;
    if shared.is_empty() {
        return None;
    }
    let by_tokens = config.min_shared_tokens > 0 && shared.len() >= config.min_shared_tokens;
    if overlap < config.min_stack_overlap && !by_tokens {
        return None;
    }
    let confidence = if by_tokens {
        overlap.max(config.shared_token_floor)
    } else {
        overlap
    };

    let (source, target, relationship_type) = match (earlier.kind(), later.kind()) {
        (EntityKind::CodeComponent, EntityKind::ArchitecturalDecision) => {
            (earlier, later, RelationshipType::Implements)
        }
        (EntityKind::ArchitecturalDecision, EntityKind::CodeComponent) => {
            (later, earlier, RelationshipType::Implements)
        }
        _ => (earlier, later, RelationshipType::RelatesTo),
    };

    Some(SuggestedRelationship {
        source_id: source.id,
        target_id: target.id,
        relationship_type,
        confidence: confidence.clamp(0.0, 1.0),
        reasoning: format!(
            "Shares {:.0}% of technical stack ({})",
            overlap * 100.0,
            shared.join(", ")
        ),
        rules: vec![InferenceRule::ContextSimilarity],
    })
}

/// A deployment assessment on the same stack as a live decision.
pub fn compliance(
    a: &Entity,
    b: &Entity,
    config: &InferenceConfig,
) -> Option<SuggestedRelationship> {
    let (assessment, decision) = match (a.kind(), b.kind()) {
        (EntityKind::DeploymentAssessment, EntityKind::ArchitecturalDecision) => (a, b),
        (EntityKind::ArchitecturalDecision, EntityKind::DeploymentAssessment) => (b, a),
        _ => return None,
    };

    let status = decision.payload.as_decision()?.status;
    let weight = match status {
        DecisionStatus::Accepted => config.accepted_weight,
        DecisionStatus::Proposed => config.proposed_weight,
        _ => return None,
    };

    let (_, shared) = stack_overlap(assessment, decision)?;
    if shared.is_empty() {
        return None;
    }

    Some(SuggestedRelationship {
        source_id: assessment.id,
        target_id: decision.id,
        relationship_type: RelationshipType::CompliesWith,
        confidence: (weight * assessment.confidence).clamp(0.0, 1.0),
        reasoning: format!(
            "Assessment targets the same stack ({}) as {} decision '{}'",
            shared.join(", "),
            status,
            decision.title
        ),
        rules: vec![InferenceRule::Compliance],
    })
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}
