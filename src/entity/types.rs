//! Core entity types.
//!
//! An [`Entity`] is a versioned record of one of the closed [`EntityKind`]
//! variants. The kind is carried by the payload variant, so it cannot drift
//! from the payload shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::payload::EntityPayload;

/// Maximum number of access contexts retained per entity.
pub const MAX_ACCESS_CONTEXTS: usize = 50;

/// Unique identifier for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A recorded architectural decision (ADR).
    ArchitecturalDecision,
    /// Readiness assessment of a deployment target.
    DeploymentAssessment,
    /// A unit of source code.
    CodeComponent,
    /// Free-form documentation or research output.
    KnowledgeArtifact,
    /// A debugging session with symptoms and resolution.
    TroubleshootingSession,
    /// Captured configuration of an environment.
    EnvironmentSnapshot,
    /// A recurring security concern and its mitigations.
    SecurityPattern,
    /// A recurring failure signature and its remediation.
    FailurePattern,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 8] = [
        Self::ArchitecturalDecision,
        Self::DeploymentAssessment,
        Self::CodeComponent,
        Self::KnowledgeArtifact,
        Self::TroubleshootingSession,
        Self::EnvironmentSnapshot,
        Self::SecurityPattern,
        Self::FailurePattern,
    ];

    /// Snake-case name, as used on disk and in pattern keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArchitecturalDecision => "architectural_decision",
            Self::DeploymentAssessment => "deployment_assessment",
            Self::CodeComponent => "code_component",
            Self::KnowledgeArtifact => "knowledge_artifact",
            Self::TroubleshootingSession => "troubleshooting_session",
            Self::EnvironmentSnapshot => "environment_snapshot",
            Self::SecurityPattern => "security_pattern",
            Self::FailurePattern => "failure_pattern",
        }
    }

    /// Whether this kind records an event that happens *in* an environment.
    pub fn is_environment_event(&self) -> bool {
        matches!(
            self,
            Self::TroubleshootingSession | Self::DeploymentAssessment | Self::FailurePattern
        )
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Technical and organizational context used for similarity scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityContext {
    pub technical_stack: Vec<String>,
    pub business_domain: Option<String>,
    pub environmental_factors: Vec<String>,
    pub stakeholders: Vec<String>,
}

impl EntityContext {
    /// Context with only a technical stack.
    pub fn with_stack<I, S>(stack: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            technical_stack: stack.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Normalized (trimmed, lower-cased, non-empty) stack tokens.
    pub fn stack_tokens(&self) -> BTreeSet<String> {
        self.technical_stack
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// How often and in which contexts an entity has been read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessPattern {
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_contexts: Vec<String>,
}

impl AccessPattern {
    /// Record one access, keeping only the most recent contexts.
    pub fn record(&mut self, context: Option<&str>, at: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = Some(at);
        if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
            self.access_contexts.push(ctx.to_string());
            if self.access_contexts.len() > MAX_ACCESS_CONTEXTS {
                let excess = self.access_contexts.len() - MAX_ACCESS_CONTEXTS;
                self.access_contexts.drain(..excess);
            }
        }
    }
}

/// Where an entity came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Created,
    Imported,
}

/// One entry of the append-only transformation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transformation {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub transformation_type: String,
    pub description: String,
    pub agent: String,
}

impl Transformation {
    pub fn new(
        timestamp: DateTime<Utc>,
        transformation_type: impl Into<String>,
        description: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            transformation_type: transformation_type.into(),
            description: description.into(),
            agent: agent.into(),
        }
    }
}

/// Provenance and history of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Evolution {
    pub origin: Origin,
    pub transformations: Vec<Transformation>,
}

/// Verification state of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Validation {
    pub is_verified: bool,
    pub verification_method: Option<String>,
    pub verification_timestamp: Option<DateTime<Utc>>,
    pub conflict_resolution: Option<String>,
}

/// A stored, versioned memory entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub relevance: f64,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub version: u64,
    #[serde(default)]
    pub context: EntityContext,
    #[serde(default)]
    pub access_pattern: AccessPattern,
    #[serde(default)]
    pub evolution: Evolution,
    #[serde(default)]
    pub validation: Validation,
    pub payload: EntityPayload,
}

impl Entity {
    /// The entity's kind, derived from its payload.
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Whether the entity carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether the caller-visible content of two records is identical.
    ///
    /// Bookkeeping fields (timestamps, version, access pattern, history) are
    /// excluded.
    pub fn same_content(&self, other: &Entity) -> bool {
        self.title == other.title
            && self.description == other.description
            && self.confidence == other.confidence
            && self.relevance == other.relevance
            && self.tags == other.tags
            && self.context == other.context
            && self.validation == other.validation
            && self.payload == other.payload
    }

    /// Most recent point at which this entity was touched.
    pub fn last_touched(&self) -> DateTime<Utc> {
        match self.access_pattern.last_accessed {
            Some(at) if at > self.last_modified => at,
            _ => self.last_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_serde() {
        for kind in EntityKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_stack_tokens_normalized() {
        let ctx = EntityContext::with_stack(["Node", " postgres ", "", "node"]);
        let tokens: Vec<_> = ctx.stack_tokens().into_iter().collect();
        assert_eq!(tokens, vec!["node".to_string(), "postgres".to_string()]);
    }

    #[test]
    fn test_access_pattern_bounded() {
        let mut pattern = AccessPattern::default();
        let now = Utc::now();
        for i in 0..(MAX_ACCESS_CONTEXTS + 5) {
            pattern.record(Some(&format!("ctx-{}", i)), now);
        }
        pattern.record(None, now);

        assert_eq!(pattern.access_count as usize, MAX_ACCESS_CONTEXTS + 6);
        assert_eq!(pattern.access_contexts.len(), MAX_ACCESS_CONTEXTS);
        assert_eq!(pattern.access_contexts[0], "ctx-5");
    }

    #[test]
    fn test_entity_id_roundtrip() {
        let id = EntityId::new();
        let parsed = EntityId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}
