//! Detection of semantically contradictory entity pairs.
//!
//! Conflicts are advisory: the detector reads a snapshot and never mutates
//! entities or relationships.

use serde::{Deserialize, Serialize};

use super::rules::stack_overlap;
use super::ConflictConfig;
use crate::entity::{DecisionStatus, Entity, EntityId, EntityKind};
use crate::graph::RelationshipGraph;

/// How urgently a conflict needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A detected contradiction between entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub entity_ids: Vec<EntityId>,
    pub severity: ConflictSeverity,
    pub description: String,
    pub recommendation: String,
}

impl Conflict {
    pub fn involves(&self, id: &EntityId) -> bool {
        self.entity_ids.contains(id)
    }
}

/// Pairs accepted decisions with deployment assessments and grades readiness.
pub struct ConflictDetector<'a> {
    config: &'a ConflictConfig,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(config: &'a ConflictConfig) -> Self {
        Self { config }
    }

    /// Scan a snapshot for conflicts, most severe first.
    pub fn detect<'e>(
        &self,
        entities: impl IntoIterator<Item = &'e Entity>,
        graph: &RelationshipGraph,
    ) -> Vec<Conflict> {
        let mut decisions = Vec::new();
        let mut assessments = Vec::new();
        for entity in entities {
            match entity.kind() {
                EntityKind::ArchitecturalDecision => decisions.push(entity),
                EntityKind::DeploymentAssessment => assessments.push(entity),
                _ => {}
            }
        }

        let mut conflicts = Vec::new();
        for decision in &decisions {
            let accepted = decision
                .payload
                .as_decision()
                .map(|d| d.status == DecisionStatus::Accepted)
                .unwrap_or(false);
            if !accepted {
                continue;
            }
            for assessment in &assessments {
                if !paired(decision, assessment, graph) {
                    continue;
                }
                if let Some(conflict) = self.grade(decision, assessment) {
                    conflicts.push(conflict);
                }
            }
        }

        conflicts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.entity_ids.cmp(&b.entity_ids))
        });
        conflicts
    }

    fn grade(&self, decision: &Entity, assessment: &Entity) -> Option<Conflict> {
        let payload = assessment.payload.as_assessment()?;
        let readiness = payload.readiness_score;

        let severity = if readiness < self.config.high_readiness_threshold {
            ConflictSeverity::High
        } else if readiness < self.config.medium_readiness_threshold {
            ConflictSeverity::Medium
        } else if self.config.flag_blocking_issues && !payload.blocking_issues.is_empty() {
            ConflictSeverity::Low
        } else {
            return None;
        };

        let description = match severity {
            ConflictSeverity::Low => format!(
                "Deployment assessment '{}' for {} lists {} blocking issue(s) against accepted decision '{}'",
                assessment.title,
                payload.environment,
                payload.blocking_issues.len(),
                decision.title
            ),
            _ => format!(
                "Accepted decision '{}' conflicts with deployment assessment '{}' for {} (readiness {:.2})",
                decision.title, assessment.title, payload.environment, readiness
            ),
        };

        let recommendation = match severity {
            ConflictSeverity::High => format!(
                "Block deployment to {} until readiness improves, or revisit decision '{}'",
                payload.environment, decision.title
            ),
            ConflictSeverity::Medium => format!(
                "Review readiness gaps in {} before relying on decision '{}'",
                payload.environment, decision.title
            ),
            ConflictSeverity::Low => format!(
                "Resolve blocking issues: {}",
                payload.blocking_issues.join("; ")
            ),
        };

        Some(Conflict {
            entity_ids: vec![decision.id, assessment.id],
            severity,
            description,
            recommendation,
        })
    }
}

fn paired(decision: &Entity, assessment: &Entity, graph: &RelationshipGraph) -> bool {
    let shares_stack = stack_overlap(decision, assessment)
        .map(|(_, shared)| !shared.is_empty())
        .unwrap_or(false);
    shares_stack || graph.connected(&decision.id, &assessment.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::validate::build_entity;
    use crate::entity::{AssessmentPayload, EntityInput, EntityPayload};
    use crate::graph::{RelationshipInput, RelationshipType};
    use chrono::Utc;

    fn decision(status: DecisionStatus, stack: &[&str]) -> Entity {
        build_entity(
            EntityInput::new(EntityPayload::decision(status, "Use Postgres"), "DB choice")
                .with_stack(stack.iter().copied()),
            EntityId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    fn assessment(readiness: f64, stack: &[&str], blocking: &[&str]) -> Entity {
        let payload = EntityPayload::DeploymentAssessment(AssessmentPayload {
            environment: "production".into(),
            readiness_score: readiness,
            blocking_issues: blocking.iter().map(|s| s.to_string()).collect(),
        });
        build_entity(
            EntityInput::new(payload, "Prod rollout").with_stack(stack.iter().copied()),
            EntityId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_severity_tiers() {
        let config = ConflictConfig::default();
        let detector = ConflictDetector::new(&config);
        let graph = RelationshipGraph::new();
        let d = decision(DecisionStatus::Accepted, &["node", "postgres"]);

        let high = assessment(0.3, &["node", "postgres"], &[]);
        let medium = assessment(0.6, &["postgres"], &[]);
        let ready = assessment(0.9, &["node"], &[]);
        let blocked = assessment(0.9, &["node"], &["missing TLS cert"]);

        let conflicts = detector.detect([&d, &high, &medium, &ready, &blocked], &graph);
        assert_eq!(conflicts.len(), 3);
        assert_eq!(conflicts[0].severity, ConflictSeverity::High);
        assert!(conflicts[0].involves(&d.id) && conflicts[0].involves(&high.id));
        assert_eq!(conflicts[1].severity, ConflictSeverity::Medium);
        assert_eq!(conflicts[2].severity, ConflictSeverity::Low);
        assert!(conflicts[2].recommendation.contains("missing TLS cert"));
    }

    #[test]
    fn test_only_accepted_decisions() {
        let config = ConflictConfig::default();
        let d = decision(DecisionStatus::Proposed, &["postgres"]);
        let a = assessment(0.1, &["postgres"], &[]);
        let conflicts = ConflictDetector::new(&config).detect([&d, &a], &RelationshipGraph::new());
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_pairing_requires_stack_or_edge() {
        let config = ConflictConfig::default();
        let d = decision(DecisionStatus::Accepted, &["postgres"]);
        let a = assessment(0.1, &["go"], &[]);

        let mut graph = RelationshipGraph::new();
        assert!(ConflictDetector::new(&config).detect([&d, &a], &graph).is_empty());

        graph
            .upsert(
                RelationshipInput::new(a.id, d.id, RelationshipType::CompliesWith),
                Utc::now(),
            )
            .unwrap();
        let conflicts = ConflictDetector::new(&config).detect([&d, &a], &graph);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::High);
    }
}
