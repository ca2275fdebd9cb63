//! Bounded breadth-first traversal over the relationship graph.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use super::index::RelationshipGraph;
use super::types::{Relationship, RelationshipId};
use crate::entity::{Entity, EntityId};

/// An entity reached by a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntity {
    pub entity: Entity,
    /// Hops from the seed; the seed itself is at depth 0.
    pub depth: usize,
}

/// Shortest path from the seed to one reached entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipPath {
    pub entity_id: EntityId,
    pub depth: usize,
    /// Edges in walk order, starting at the seed.
    pub relationships: Vec<Relationship>,
}

/// Result of [`KnowledgeStore::find_related_entities`](crate::KnowledgeStore::find_related_entities).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntities {
    pub entities: Vec<RelatedEntity>,
    pub relationship_paths: Vec<RelationshipPath>,
}

impl RelatedEntities {
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|r| r.entity.id).collect()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.iter().any(|r| r.entity.id == *id)
    }

    pub fn path_to(&self, id: &EntityId) -> Option<&RelationshipPath> {
        self.relationship_paths.iter().find(|p| p.entity_id == *id)
    }
}

/// Walk the graph from `seed`, treating edges as undirected.
///
/// Each entity is reported once, at its shortest depth. An unknown seed yields
/// an empty result.
pub fn traverse(
    graph: &RelationshipGraph,
    entities: &HashMap<EntityId, Entity>,
    seed: EntityId,
    max_depth: usize,
) -> RelatedEntities {
    let Some(seed_entity) = entities.get(&seed) else {
        return RelatedEntities::default();
    };

    let mut result = RelatedEntities {
        entities: vec![RelatedEntity {
            entity: seed_entity.clone(),
            depth: 0,
        }],
        relationship_paths: Vec::new(),
    };

    let mut visited: HashSet<EntityId> = HashSet::from([seed]);
    let mut parents: HashMap<EntityId, (EntityId, RelationshipId)> = HashMap::new();
    let mut queue: VecDeque<(EntityId, usize)> = VecDeque::from([(seed, 0)]);

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for edge in graph.edges_of(&current) {
            let Some(next) = edge.other_end(&current) else {
                continue;
            };
            if visited.contains(&next) {
                continue;
            }
            let Some(entity) = entities.get(&next) else {
                continue;
            };

            visited.insert(next);
            parents.insert(next, (current, edge.id));
            queue.push_back((next, depth + 1));

            result.entities.push(RelatedEntity {
                entity: entity.clone(),
                depth: depth + 1,
            });
            result.relationship_paths.push(RelationshipPath {
                entity_id: next,
                depth: depth + 1,
                relationships: path_from_parents(graph, &parents, seed, next),
            });
        }
    }

    result
}

fn path_from_parents(
    graph: &RelationshipGraph,
    parents: &HashMap<EntityId, (EntityId, RelationshipId)>,
    seed: EntityId,
    target: EntityId,
) -> Vec<Relationship> {
    let mut path = Vec::new();
    let mut cursor = target;
    while cursor != seed {
        let Some((parent, edge_id)) = parents.get(&cursor) else {
            break;
        };
        if let Some(edge) = graph.get(edge_id) {
            path.push(edge.clone());
        }
        cursor = *parent;
    }
    path.reverse();
    path
}
