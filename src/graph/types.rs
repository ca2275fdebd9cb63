//! Relationship types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::validate::check_unit;
use crate::entity::EntityId;
use crate::error::{Error, Result};

/// Unique identifier for a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(pub Uuid);

impl RelationshipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::validation("relationship id", e.to_string()))
    }
}

impl Default for RelationshipId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Semantic type of a directed relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Source requires target to function.
    DependsOn,
    /// Source conforms to the decision or policy in target.
    CompliesWith,
    /// Source event happened in the environment captured by target.
    OccurredIn,
    /// Source realizes the design described by target.
    Implements,
    /// Undirected association.
    RelatesTo,
    /// Source replaces target.
    Supersedes,
    /// Source fixes the problem described by target.
    Resolves,
    /// Source led to target.
    Causes,
}

impl RelationshipType {
    /// Whether direction carries no meaning for this type.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::RelatesTo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependsOn => "depends_on",
            Self::CompliesWith => "complies_with",
            Self::OccurredIn => "occurred_in",
            Self::Implements => "implements",
            Self::RelatesTo => "relates_to",
            Self::Supersedes => "supersedes",
            Self::Resolves => "resolves",
            Self::Causes => "causes",
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored, directed, weighted edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: RelationshipId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub strength: f64,
    pub confidence: f64,
    pub created: DateTime<Utc>,
    pub last_validated: DateTime<Utc>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Relationship {
    /// The `(source, target, type)` uniqueness key.
    pub fn triple(&self) -> Triple {
        (self.source_id, self.target_id, self.relationship_type)
    }

    /// The endpoint opposite to `id`, if `id` is an endpoint.
    pub fn other_end(&self, id: &EntityId) -> Option<EntityId> {
        if self.source_id == *id {
            Some(self.target_id)
        } else if self.target_id == *id {
            Some(self.source_id)
        } else {
            None
        }
    }

    /// Whether `id` is the source or the target.
    pub fn touches(&self, id: &EntityId) -> bool {
        self.source_id == *id || self.target_id == *id
    }

    /// Whether the mutable attributes equal those of `input`.
    pub fn same_attributes(&self, input: &RelationshipInput) -> bool {
        self.strength == input.strength
            && self.confidence == input.confidence
            && self.evidence == input.evidence
    }
}

/// Uniqueness key of a relationship.
pub type Triple = (EntityId, EntityId, RelationshipType);

/// Fields supplied to [`KnowledgeStore::upsert_relationship`](crate::KnowledgeStore::upsert_relationship).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipInput {
    pub source_id: EntityId,
    pub target_id: EntityId,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Overwrite an existing edge with the same triple instead of failing.
    #[serde(default)]
    pub replace: bool,
}

fn default_strength() -> f64 {
    0.5
}

fn default_confidence() -> f64 {
    0.8
}

impl RelationshipInput {
    pub fn new(source_id: EntityId, target_id: EntityId, relationship_type: RelationshipType) -> Self {
        Self {
            source_id,
            target_id,
            relationship_type,
            strength: default_strength(),
            confidence: default_confidence(),
            evidence: Vec::new(),
            replace: false,
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    /// Allow overwriting an existing edge with the same triple.
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn triple(&self) -> Triple {
        (self.source_id, self.target_id, self.relationship_type)
    }

    /// Check field ranges and reject self-loops.
    pub fn validate(&self) -> Result<()> {
        check_unit("strength", self.strength)?;
        check_unit("confidence", self.confidence)?;
        if self.source_id == self.target_id {
            return Err(Error::validation(
                "targetId",
                "a relationship cannot connect an entity to itself",
            ));
        }
        Ok(())
    }

    /// Materialize into a new relationship.
    pub(crate) fn into_relationship(self, now: DateTime<Utc>) -> Relationship {
        Relationship {
            id: RelationshipId::new(),
            source_id: self.source_id,
            target_id: self.target_id,
            relationship_type: self.relationship_type,
            strength: self.strength,
            confidence: self.confidence,
            created: now,
            last_validated: now,
            evidence: self.evidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_validation() {
        let a = EntityId::new();
        let b = EntityId::new();

        assert!(RelationshipInput::new(a, b, RelationshipType::DependsOn)
            .validate()
            .is_ok());
        assert!(RelationshipInput::new(a, a, RelationshipType::DependsOn)
            .validate()
            .is_err());
        assert!(RelationshipInput::new(a, b, RelationshipType::DependsOn)
            .with_strength(-0.1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_other_end() {
        let a = EntityId::new();
        let b = EntityId::new();
        let rel = RelationshipInput::new(a, b, RelationshipType::Implements)
            .into_relationship(Utc::now());

        assert_eq!(rel.other_end(&a), Some(b));
        assert_eq!(rel.other_end(&b), Some(a));
        assert_eq!(rel.other_end(&EntityId::new()), None);
    }

    #[test]
    fn test_relationship_json_shape() {
        let rel = RelationshipInput::new(EntityId::new(), EntityId::new(), RelationshipType::CompliesWith)
            .into_relationship(Utc::now());
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "complies_with");
        assert!(json.get("sourceId").is_some());
        assert!(json.get("lastValidated").is_some());
    }
}
