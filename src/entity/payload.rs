//! Kind-specific entity payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::types::EntityKind;
use crate::error::{Error, Result};

/// Lifecycle status of an architectural decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    #[default]
    Proposed,
    Accepted,
    Deprecated,
    Superseded,
    Rejected,
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proposed => write!(f, "proposed"),
            Self::Accepted => write!(f, "accepted"),
            Self::Deprecated => write!(f, "deprecated"),
            Self::Superseded => write!(f, "superseded"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionPayload {
    pub status: DecisionStatus,
    pub context: String,
    pub decision: String,
    pub consequences: Vec<String>,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentPayload {
    pub environment: String,
    pub readiness_score: f64,
    pub blocking_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentPayload {
    pub file_path: String,
    pub language: Option<String>,
    pub component_type: String,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactPayload {
    pub artifact_type: String,
    pub content: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TroubleshootingPayload {
    pub failure_type: String,
    pub symptoms: Vec<String>,
    pub resolution: Option<String>,
    pub resolved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentPayload {
    pub environment: String,
    pub configuration: BTreeMap<String, Value>,
    pub detected_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityPayload {
    pub pattern_type: String,
    pub mitigations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FailurePayload {
    pub signature: String,
    pub occurrences: u32,
    pub remediation_steps: Vec<String>,
}

/// Kind-specific structured data of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EntityPayload {
    ArchitecturalDecision(DecisionPayload),
    DeploymentAssessment(AssessmentPayload),
    CodeComponent(ComponentPayload),
    KnowledgeArtifact(ArtifactPayload),
    TroubleshootingSession(TroubleshootingPayload),
    EnvironmentSnapshot(EnvironmentPayload),
    SecurityPattern(SecurityPayload),
    FailurePattern(FailurePayload),
}

impl EntityPayload {
    /// Architectural decision with the given status and decision text.
    pub fn decision(status: DecisionStatus, decision: impl Into<String>) -> Self {
        Self::ArchitecturalDecision(DecisionPayload {
            status,
            decision: decision.into(),
            ..Default::default()
        })
    }

    /// Deployment assessment for an environment.
    pub fn assessment(environment: impl Into<String>, readiness_score: f64) -> Self {
        Self::DeploymentAssessment(AssessmentPayload {
            environment: environment.into(),
            readiness_score,
            blocking_issues: Vec::new(),
        })
    }

    /// Code component at a file path.
    pub fn component(file_path: impl Into<String>) -> Self {
        Self::CodeComponent(ComponentPayload {
            file_path: file_path.into(),
            ..Default::default()
        })
    }

    /// Knowledge artifact with inline content.
    pub fn artifact(artifact_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self::KnowledgeArtifact(ArtifactPayload {
            artifact_type: artifact_type.into(),
            content: content.into(),
            source: None,
        })
    }

    /// Troubleshooting session for a failure type.
    pub fn troubleshooting(failure_type: impl Into<String>) -> Self {
        Self::TroubleshootingSession(TroubleshootingPayload {
            failure_type: failure_type.into(),
            ..Default::default()
        })
    }

    /// Snapshot of a named environment.
    pub fn environment(environment: impl Into<String>) -> Self {
        Self::EnvironmentSnapshot(EnvironmentPayload {
            environment: environment.into(),
            ..Default::default()
        })
    }

    pub fn security(pattern_type: impl Into<String>) -> Self {
        Self::SecurityPattern(SecurityPayload {
            pattern_type: pattern_type.into(),
            mitigations: Vec::new(),
        })
    }

    pub fn failure(signature: impl Into<String>) -> Self {
        Self::FailurePattern(FailurePayload {
            signature: signature.into(),
            occurrences: 1,
            remediation_steps: Vec::new(),
        })
    }

    /// The kind this payload belongs to.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::ArchitecturalDecision(_) => EntityKind::ArchitecturalDecision,
            Self::DeploymentAssessment(_) => EntityKind::DeploymentAssessment,
            Self::CodeComponent(_) => EntityKind::CodeComponent,
            Self::KnowledgeArtifact(_) => EntityKind::KnowledgeArtifact,
            Self::TroubleshootingSession(_) => EntityKind::TroubleshootingSession,
            Self::EnvironmentSnapshot(_) => EntityKind::EnvironmentSnapshot,
            Self::SecurityPattern(_) => EntityKind::SecurityPattern,
            Self::FailurePattern(_) => EntityKind::FailurePattern,
        }
    }

    /// Check that the kind-specific required fields are present and in range.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::ArchitecturalDecision(p) => require("payload.decision", &p.decision),
            Self::DeploymentAssessment(p) => {
                require("payload.environment", &p.environment)?;
                super::validate::check_unit("payload.readinessScore", p.readiness_score)
            }
            Self::CodeComponent(p) => require("payload.filePath", &p.file_path),
            Self::KnowledgeArtifact(p) => require("payload.content", &p.content),
            Self::TroubleshootingSession(p) => require("payload.failureType", &p.failure_type),
            Self::EnvironmentSnapshot(p) => require("payload.environment", &p.environment),
            Self::SecurityPattern(p) => require("payload.patternType", &p.pattern_type),
            Self::FailurePattern(p) => require("payload.signature", &p.signature),
        }
    }

    pub fn as_decision(&self) -> Option<&DecisionPayload> {
        match self {
            Self::ArchitecturalDecision(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_assessment(&self) -> Option<&AssessmentPayload> {
        match self {
            Self::DeploymentAssessment(p) => Some(p),
            _ => None,
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::validation(field, "must not be empty"))
    } else {
        Ok(())
    }
}
