//! Entity construction, merging, and invariant checks.
//!
//! Both [`build_entity`] and [`merge_entity`] are pure: they produce a
//! candidate record and validate it, so a failed upsert never leaves a
//! partially applied change behind.

use chrono::{DateTime, Utc};

use super::input::EntityInput;
use super::types::{Entity, EntityId, Evolution, Origin, Transformation};
use crate::error::{Error, Result};

/// Confidence assigned when an insert omits it.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Relevance assigned when an insert omits it.
pub const DEFAULT_RELEVANCE: f64 = 0.8;

const DEFAULT_AGENT: &str = "system";

/// Check that a score is finite and within `[0, 1]`.
pub fn check_unit(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::validation(
            field,
            format!("must be within [0, 1], got {}", value),
        ))
    }
}

/// Trim tags, drop empties and duplicates, keep first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Validate every per-entity invariant that does not depend on store state.
pub fn validate_entity(entity: &Entity) -> Result<()> {
    if entity.title.trim().is_empty() {
        return Err(Error::validation("title", "must not be empty"));
    }
    check_unit("confidence", entity.confidence)?;
    check_unit("relevance", entity.relevance)?;
    entity.payload.validate()?;
    if entity.validation.is_verified && entity.description.trim().is_empty() {
        return Err(Error::validation(
            "description",
            "must not be empty on a verified entity",
        ));
    }
    Ok(())
}

/// Build a fresh entity (version 1) from insert input.
pub fn build_entity(input: EntityInput, id: EntityId, now: DateTime<Utc>) -> Result<Entity> {
    let payload = input
        .payload
        .ok_or_else(|| Error::validation("payload", "required when creating an entity"))?;
    let title = input
        .title
        .ok_or_else(|| Error::validation("title", "required when creating an entity"))?;

    let origin = input.origin.unwrap_or_default();
    let created = input.created.unwrap_or(now);
    let agent = input.agent.unwrap_or_else(|| DEFAULT_AGENT.to_string());
    let transformation = match origin {
        Origin::Created => Transformation::new(now, "created", "Entity created", agent),
        Origin::Imported => Transformation::new(now, "imported", "Entity imported", agent),
    };

    let entity = Entity {
        id,
        title: title.trim().to_string(),
        description: input.description.unwrap_or_default(),
        confidence: input.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        relevance: input.relevance.unwrap_or(DEFAULT_RELEVANCE),
        tags: normalize_tags(input.tags.unwrap_or_default()),
        created,
        last_modified: created,
        version: 1,
        context: input.context.unwrap_or_default(),
        access_pattern: Default::default(),
        evolution: Evolution {
            origin,
            transformations: vec![transformation],
        },
        validation: input.validation.unwrap_or_default(),
        payload,
    };

    validate_entity(&entity)?;
    Ok(entity)
}

/// Merge update input into an existing entity.
///
/// Returns `Ok(None)` when the input changes nothing, otherwise the new record
/// with `version + 1`, a fresh `last_modified` and one appended transformation.
pub fn merge_entity(
    existing: &Entity,
    input: EntityInput,
    now: DateTime<Utc>,
) -> Result<Option<Entity>> {
    merge_labeled(existing, input, now, "updated", None)
}

/// [`merge_entity`] with a custom transformation type and description.
///
/// Without a description the record reads `Updated <fields>`.
pub fn merge_labeled(
    existing: &Entity,
    input: EntityInput,
    now: DateTime<Utc>,
    transformation_type: &str,
    description: Option<String>,
) -> Result<Option<Entity>> {
    let mut next = existing.clone();
    let mut changed: Vec<&'static str> = Vec::new();

    if let Some(payload) = input.payload {
        if payload.kind() != existing.kind() {
            return Err(Error::validation(
                "payload",
                format!(
                    "kind is immutable: entity is {}, update supplied {}",
                    existing.kind(),
                    payload.kind()
                ),
            ));
        }
        if payload != next.payload {
            next.payload = payload;
            changed.push("payload");
        }
    }
    if let Some(title) = input.title {
        let title = title.trim().to_string();
        if title != next.title {
            next.title = title;
            changed.push("title");
        }
    }
    if let Some(description) = input.description {
        if description != next.description {
            next.description = description;
            changed.push("description");
        }
    }
    if let Some(confidence) = input.confidence {
        if confidence != next.confidence {
            next.confidence = confidence;
            changed.push("confidence");
        }
    }
    if let Some(relevance) = input.relevance {
        if relevance != next.relevance {
            next.relevance = relevance;
            changed.push("relevance");
        }
    }
    if let Some(tags) = input.tags {
        let tags = normalize_tags(tags);
        if tags != next.tags {
            next.tags = tags;
            changed.push("tags");
        }
    }
    if let Some(context) = input.context {
        if context != next.context {
            next.context = context;
            changed.push("context");
        }
    }
    if let Some(validation) = input.validation {
        if validation != next.validation {
            next.validation = validation;
            changed.push("validation");
        }
    }

    validate_entity(&next)?;

    if changed.is_empty() {
        return Ok(None);
    }

    next.version = existing.version + 1;
    next.last_modified = now.max(existing.last_modified);
    next.evolution.transformations.push(Transformation::new(
        now,
        transformation_type,
        description.unwrap_or_else(|| format!("Updated {}", changed.join(", "))),
        input.agent.unwrap_or_else(|| DEFAULT_AGENT.to_string()),
    ));

    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::payload::{DecisionStatus, EntityPayload};
    use crate::entity::types::Validation;

    fn decision_input() -> EntityInput {
        EntityInput::new(
            EntityPayload::decision(DecisionStatus::Accepted, "Use Postgres"),
            "Database choice",
        )
    }

    #[test]
    fn test_build_defaults() {
        let entity = build_entity(decision_input(), EntityId::new(), Utc::now()).unwrap();
        assert_eq!(entity.version, 1);
        assert_eq!(entity.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(entity.created, entity.last_modified);
        assert_eq!(entity.evolution.transformations.len(), 1);
        assert_eq!(entity.evolution.transformations[0].transformation_type, "created");
    }

    #[test]
    fn test_build_rejects_bad_fields() {
        let err = build_entity(
            decision_input().with_confidence(1.5),
            EntityId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "confidence"));

        let err = build_entity(decision_input().with_title("  "), EntityId::new(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "title"));

        let missing_payload = EntityInput {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(build_entity(missing_payload, EntityId::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_verified_requires_description() {
        let input = decision_input().with_validation(Validation {
            is_verified: true,
            ..Default::default()
        });
        assert!(build_entity(input.clone(), EntityId::new(), Utc::now()).is_err());
        assert!(build_entity(
            input.with_description("Chosen for JSONB support"),
            EntityId::new(),
            Utc::now()
        )
        .is_ok());
    }

    #[test]
    fn test_merge_bumps_version_on_change() {
        let entity = build_entity(decision_input(), EntityId::new(), Utc::now()).unwrap();
        let merged = merge_entity(
            &entity,
            EntityInput::update(entity.id).with_confidence(0.95),
            Utc::now(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(merged.version, 2);
        assert_eq!(merged.confidence, 0.95);
        assert_eq!(merged.created, entity.created);
        assert_eq!(merged.evolution.transformations.len(), 2);
        assert_eq!(merged.evolution.transformations[1].description, "Updated confidence");
    }

    #[test]
    fn test_merge_without_change_is_noop() {
        let entity = build_entity(decision_input(), EntityId::new(), Utc::now()).unwrap();
        let merged = merge_entity(
            &entity,
            EntityInput::update(entity.id).with_title("Database choice"),
            Utc::now(),
        )
        .unwrap();
        assert!(merged.is_none());
    }

    #[test]
    fn test_merge_rejects_kind_change() {
        let entity = build_entity(decision_input(), EntityId::new(), Utc::now()).unwrap();
        let err = merge_entity(
            &entity,
            EntityInput::update(entity.id).with_payload(EntityPayload::component("src/db.rs")),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "payload"));
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![
            " db ".into(),
            "infra".into(),
            "db".into(),
            "".into(),
        ]);
        assert_eq!(tags, vec!["db".to_string(), "infra".to_string()]);
    }
}
