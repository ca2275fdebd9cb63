//! Filtering, sorting, pagination and aggregation over stored entities.
//!
//! Queries are read-only. Ordering is always total (sort key, then id), so
//! pages of a fixed query concatenate to the unpaginated sequence.
//!
//! ## Example
//!
//! ```rust,ignore
//! use archmem_core::query::{EntityQuery, SortKey, SortOrder};
//! use archmem_core::entity::EntityKind;
//!
//! let result = store.query_entities(
//!     EntityQuery::new()
//!         .kind(EntityKind::ArchitecturalDecision)
//!         .min_confidence(0.7)
//!         .sort(SortKey::LastModified, SortOrder::Descending)
//!         .page(1, 20)
//!         .include_related(),
//! )?;
//! println!("{} of {}", result.entities.len(), result.total_count);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::entity::validate::check_unit;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::graph::{Relationship, RelationshipGraph};

/// Field to order results by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Confidence,
    Relevance,
    #[default]
    LastModified,
    Created,
    Title,
    AccessCount,
    Version,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Query builder for finding entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityQuery {
    /// Restrict to these kinds.
    pub kinds: Option<Vec<EntityKind>>,

    /// Match entities carrying any of these tags.
    pub tags: Option<Vec<String>>,

    /// Minimum confidence (inclusive).
    pub min_confidence: Option<f64>,

    /// Minimum relevance (inclusive).
    pub min_relevance: Option<f64>,

    /// Case-insensitive substring over title and description.
    pub text: Option<String>,

    pub sort_by: SortKey,

    pub order: SortOrder,

    /// 1-based page number.
    pub page: Option<usize>,

    pub page_size: Option<usize>,

    /// Attach one-hop relationships of the returned entities.
    pub include_related: bool,

    /// Record an access on every returned entity under this context.
    pub track_access: Option<String>,
}

impl EntityQuery {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind to the kind filter.
    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.kinds.get_or_insert_with(Vec::new).push(kind);
        self
    }

    /// Add a tag to the any-match tag filter.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    pub fn min_confidence(mut self, threshold: f64) -> Self {
        self.min_confidence = Some(threshold);
        self
    }

    pub fn min_relevance(mut self, threshold: f64) -> Self {
        self.min_relevance = Some(threshold);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn sort(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort_by = key;
        self.order = order;
        self
    }

    pub fn page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn include_related(mut self) -> Self {
        self.include_related = true;
        self
    }

    pub fn track_access(mut self, context: impl Into<String>) -> Self {
        self.track_access = Some(context.into());
        self
    }

    /// Check if an entity matches this query's filters.
    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&entity.kind()) {
                return false;
            }
        }

        if let Some(ref tags) = self.tags {
            if !tags.iter().any(|t| entity.has_tag(t)) {
                return false;
            }
        }

        if let Some(min) = self.min_confidence {
            if entity.confidence < min {
                return false;
            }
        }
        if let Some(min) = self.min_relevance {
            if entity.relevance < min {
                return false;
            }
        }

        if let Some(ref text) = self.text {
            let needle = text.to_lowercase();
            if !entity.title.to_lowercase().contains(&needle)
                && !entity.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        true
    }

    /// Total order used for sorting: the sort key, then id ascending.
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let primary = match self.sort_by {
            SortKey::Confidence => a.confidence.total_cmp(&b.confidence),
            SortKey::Relevance => a.relevance.total_cmp(&b.relevance),
            SortKey::LastModified => a.last_modified.cmp(&b.last_modified),
            SortKey::Created => a.created.cmp(&b.created),
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::AccessCount => a
                .access_pattern
                .access_count
                .cmp(&b.access_pattern.access_count),
            SortKey::Version => a.version.cmp(&b.version),
        };
        let primary = match self.order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Reject filters and paging that cannot mean what the caller asked for.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == Some(0) {
            return Err(Error::validation("pageSize", "must be greater than zero"));
        }
        if self.page.is_some() && self.page_size.is_none() {
            return Err(Error::validation("page", "requires pageSize"));
        }
        if let Some(min) = self.min_confidence {
            check_unit("minConfidence", min)?;
        }
        if let Some(min) = self.min_relevance {
            check_unit("minRelevance", min)?;
        }
        Ok(())
    }

    /// Execute the query against an entity map and relationship graph.
    pub fn execute(
        &self,
        entities: &HashMap<EntityId, Entity>,
        graph: &RelationshipGraph,
    ) -> Result<QueryResult> {
        self.validate()?;

        let mut matched: Vec<&Entity> = entities.values().filter(|e| self.matches(e)).collect();
        matched.sort_by(|a, b| self.compare(a, b));

        let total_count = matched.len();
        let aggregations = Aggregations::from_entities(matched.iter().copied());

        let page: Vec<Entity> = match self.page_size {
            Some(size) => {
                let page = self.page.unwrap_or(1).max(1);
                matched
                    .into_iter()
                    .skip((page - 1).saturating_mul(size))
                    .take(size)
                    .cloned()
                    .collect()
            }
            None => matched.into_iter().cloned().collect(),
        };

        let relationships = if self.include_related {
            Some(one_hop(graph, &page))
        } else {
            None
        };

        Ok(QueryResult {
            entities: page,
            total_count,
            aggregations,
            relationships,
        })
    }
}

/// Counts grouped by kind and by tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregations {
    pub by_kind: BTreeMap<EntityKind, usize>,
    pub by_tag: BTreeMap<String, usize>,
}

impl Aggregations {
    pub fn from_entities<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Self {
        let mut aggregations = Self::default();
        for entity in entities {
            *aggregations.by_kind.entry(entity.kind()).or_insert(0) += 1;
            for tag in &entity.tags {
                *aggregations.by_tag.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        aggregations
    }
}

/// Result of [`KnowledgeStore::query_entities`](crate::KnowledgeStore::query_entities).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// The requested page.
    pub entities: Vec<Entity>,
    /// Matches before pagination.
    pub total_count: usize,
    /// Computed over all matches, not just the page.
    pub aggregations: Aggregations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
}

fn one_hop(graph: &RelationshipGraph, page: &[Entity]) -> Vec<Relationship> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entity in page {
        for edge in graph.edges_of(&entity.id) {
            if seen.insert(edge.id) {
                out.push(edge.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::validate::build_entity;
    use crate::entity::{DecisionStatus, EntityInput, EntityPayload};
    use crate::graph::{RelationshipInput, RelationshipType};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn insert(map: &mut HashMap<EntityId, Entity>, input: EntityInput) -> EntityId {
        let entity = build_entity(input, EntityId::new(), Utc::now()).unwrap();
        let id = entity.id;
        map.insert(id, entity);
        id
    }

    fn fixture() -> (HashMap<EntityId, Entity>, Vec<EntityId>) {
        let mut map = HashMap::new();
        let ids = vec![
            insert(
                &mut map,
                EntityInput::new(
                    EntityPayload::decision(DecisionStatus::Accepted, "Use Postgres"),
                    "Database",
                )
                .with_confidence(0.9)
                .with_tags(["db", "infra"]),
            ),
            insert(
                &mut map,
                EntityInput::new(
                    EntityPayload::decision(DecisionStatus::Proposed, "Use Redis"),
                    "Cache",
                )
                .with_confidence(0.6)
                .with_tags(["cache"]),
            ),
            insert(
                &mut map,
                EntityInput::new(EntityPayload::assessment("prod", 0.7), "Prod readiness")
                    .with_confidence(0.75)
                    .with_tags(["infra"]),
            ),
        ];
        (map, ids)
    }

    #[test]
    fn test_query_builder() {
        let query = EntityQuery::new()
            .kind(EntityKind::CodeComponent)
            .tag("db")
            .min_confidence(0.5)
            .page(2, 10);

        assert_eq!(query.kinds, Some(vec![EntityKind::CodeComponent]));
        assert_eq!(query.tags, Some(vec!["db".to_string()]));
        assert_eq!(query.page, Some(2));
        assert_eq!(query.page_size, Some(10));
    }

    #[test]
    fn test_filters_and_aggregations() {
        let (map, _) = fixture();
        let graph = RelationshipGraph::new();

        let result = EntityQuery::new()
            .tag("infra")
            .execute(&map, &graph)
            .unwrap();
        assert_eq!(result.total_count, 2);
        assert_eq!(result.aggregations.by_tag.get("infra"), Some(&2));
        assert_eq!(result.aggregations.by_tag.get("db"), Some(&1));
        assert_eq!(
            result.aggregations.by_kind.get(&EntityKind::DeploymentAssessment),
            Some(&1)
        );

        let result = EntityQuery::new()
            .kind(EntityKind::ArchitecturalDecision)
            .min_confidence(0.8)
            .execute(&map, &graph)
            .unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.entities[0].title, "Database");
    }

    #[test]
    fn test_sort_by_confidence() {
        let (map, _) = fixture();
        let graph = RelationshipGraph::new();

        let result = EntityQuery::new()
            .sort(SortKey::Confidence, SortOrder::Ascending)
            .execute(&map, &graph)
            .unwrap();
        let titles: Vec<_> = result.entities.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Cache", "Prod readiness", "Database"]);
    }

    #[test]
    fn test_pagination_keeps_aggregations_global() {
        let (map, _) = fixture();
        let graph = RelationshipGraph::new();

        let result = EntityQuery::new()
            .sort(SortKey::Title, SortOrder::Ascending)
            .page(2, 2)
            .execute(&map, &graph)
            .unwrap();
        assert_eq!(result.total_count, 3);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].title, "Prod readiness");
        assert_eq!(result.aggregations.by_kind.values().sum::<usize>(), 3);

        let past_end = EntityQuery::new().page(5, 2).execute(&map, &graph).unwrap();
        assert!(past_end.entities.is_empty());
        assert_eq!(past_end.total_count, 3);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let (map, _) = fixture();
        let err = EntityQuery::new()
            .page(1, 0)
            .execute(&map, &RelationshipGraph::new())
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_page_without_page_size_rejected() {
        let (map, _) = fixture();
        let query = EntityQuery {
            page: Some(2),
            ..EntityQuery::new()
        };
        let err = query.execute(&map, &RelationshipGraph::new()).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "page"));
    }

    #[test]
    fn test_nan_thresholds_rejected() {
        let (map, _) = fixture();
        let graph = RelationshipGraph::new();

        let err = EntityQuery::new()
            .min_confidence(f64::NAN)
            .execute(&map, &graph)
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "minConfidence"));

        let err = EntityQuery {
            min_relevance: Some(f64::NAN),
            ..EntityQuery::new()
        }
        .execute(&map, &graph)
        .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "minRelevance"));

        assert!(EntityQuery::new().min_confidence(1.5).execute(&map, &graph).is_err());
        let all = EntityQuery::new().min_confidence(0.0).execute(&map, &graph).unwrap();
        assert_eq!(all.total_count, map.len());
    }

    #[test]
    fn test_include_related_one_hop() {
        let (map, ids) = fixture();
        let mut graph = RelationshipGraph::new();
        graph
            .upsert(
                RelationshipInput::new(ids[2], ids[0], RelationshipType::CompliesWith),
                Utc::now(),
            )
            .unwrap();

        let result = EntityQuery::new()
            .text("database")
            .include_related()
            .execute(&map, &graph)
            .unwrap();
        let rels = result.relationships.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].source_id, ids[2]);

        let plain = EntityQuery::new().execute(&map, &graph).unwrap();
        assert!(plain.relationships.is_none());
    }
}
