//! Caller-facing upsert input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::EntityPayload;
use super::types::{EntityContext, EntityId, Origin, Validation};

/// Fields supplied to [`KnowledgeStore::upsert_entity`](crate::KnowledgeStore::upsert_entity).
///
/// Every field is optional: on insert, `title` and `payload` are required; on
/// update, only the supplied fields replace the stored ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityInput {
    pub id: Option<EntityId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub confidence: Option<f64>,
    pub relevance: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub context: Option<EntityContext>,
    pub payload: Option<EntityPayload>,
    pub validation: Option<Validation>,
    /// Origin recorded on insert; ignored on update.
    pub origin: Option<Origin>,
    /// Creation timestamp honored on insert (imports); ignored on update.
    pub created: Option<DateTime<Utc>>,
    /// Agent named in the transformation record.
    pub agent: Option<String>,
}

impl EntityInput {
    /// Input for a new entity.
    pub fn new(payload: EntityPayload, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            payload: Some(payload),
            ..Default::default()
        }
    }

    /// Input that updates an existing entity.
    pub fn update(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the context with one carrying only this technical stack.
    pub fn with_stack<I, S>(mut self, stack: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = Some(EntityContext::with_stack(stack));
        self
    }

    pub fn with_context(mut self, context: EntityContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_payload(mut self, payload: EntityPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Mark as imported from an external source with its original timestamp.
    pub fn imported(mut self, created: DateTime<Utc>) -> Self {
        self.origin = Some(Origin::Imported);
        self.created = Some(created);
        self
    }

    /// Override the creation timestamp without changing the origin.
    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}
