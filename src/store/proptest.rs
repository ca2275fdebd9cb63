//! Property-based tests for the store using proptest.
//!
//! - Content-changing upserts advance the version by exactly one
//! - Concatenated pages reproduce the unpaginated ordering
//! - Traversal terminates on arbitrary graphs and reports each entity once

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::collections::HashSet;

    use crate::entity::{EntityInput, EntityPayload};
    use crate::graph::{RelationshipInput, RelationshipType};
    use crate::query::{EntityQuery, SortKey, SortOrder};
    use crate::store::KnowledgeStore;

    fn sort_key() -> impl Strategy<Value = SortKey> {
        prop_oneof![
            Just(SortKey::Confidence),
            Just(SortKey::Relevance),
            Just(SortKey::LastModified),
            Just(SortKey::Created),
            Just(SortKey::Title),
            Just(SortKey::Version),
        ]
    }

    fn sort_order() -> impl Strategy<Value = SortOrder> {
        prop_oneof![Just(SortOrder::Ascending), Just(SortOrder::Descending)]
    }

    fn relationship_type() -> impl Strategy<Value = RelationshipType> {
        prop_oneof![
            Just(RelationshipType::DependsOn),
            Just(RelationshipType::RelatesTo),
            Just(RelationshipType::Causes),
        ]
    }

    proptest! {
        /// N distinct descriptions after creation give version N + 1.
        #[test]
        fn version_counts_content_upserts(updates in 0usize..20) {
            let store = KnowledgeStore::in_memory();
            let created = store
                .upsert_entity(EntityInput::new(EntityPayload::artifact("note", "body"), "Subject"))
                .unwrap();

            for i in 0..updates {
                store
                    .upsert_entity(EntityInput::update(created.id).with_description(format!("revision {}", i)))
                    .unwrap();
            }

            let stored = store.get_entity(&created.id).unwrap().unwrap();
            prop_assert_eq!(stored.version, updates as u64 + 1);
            prop_assert_eq!(stored.evolution.transformations.len(), updates + 1);
        }

        /// Paging never drops, repeats or reorders entities.
        #[test]
        fn pagination_is_stable(
            scores in prop::collection::vec((0u8..5, 0u8..5), 0..25),
            page_size in 1usize..7,
            key in sort_key(),
            order in sort_order(),
        ) {
            let store = KnowledgeStore::in_memory();
            for (i, (confidence, relevance)) in scores.iter().enumerate() {
                store
                    .upsert_entity(
                        EntityInput::new(EntityPayload::artifact("note", "x"), format!("T{}", i % 3))
                            .with_confidence(*confidence as f64 / 4.0)
                            .with_relevance(*relevance as f64 / 4.0),
                    )
                    .unwrap();
            }

            let base = EntityQuery::new().sort(key, order);
            let all = store.query_entities(&base).unwrap();
            prop_assert_eq!(all.total_count, scores.len());

            let pages = scores.len().div_ceil(page_size).max(1);
            let mut paged = Vec::new();
            for page in 1..=pages {
                let result = store.query_entities(&base.clone().page(page, page_size)).unwrap();
                prop_assert!(result.entities.len() <= page_size);
                paged.extend(result.entities.into_iter().map(|e| e.id));
            }
            let expected: Vec<_> = all.entities.iter().map(|e| e.id).collect();
            prop_assert_eq!(paged, expected);
        }

        /// Traversal reports each reachable entity exactly once, within depth.
        #[test]
        fn traversal_terminates_without_duplicates(
            count in 1usize..10,
            edges in prop::collection::vec((0usize..10, 0usize..10, relationship_type()), 0..30),
            depth in 0usize..6,
        ) {
            let store = KnowledgeStore::in_memory();
            let ids: Vec<_> = (0..count)
                .map(|i| {
                    store
                        .upsert_entity(EntityInput::new(EntityPayload::artifact("note", "x"), format!("E{}", i)))
                        .unwrap()
                        .id
                })
                .collect();

            for (a, b, kind) in edges {
                let (a, b) = (a % count, b % count);
                if a == b {
                    continue;
                }
                let _ = store.upsert_relationship(RelationshipInput::new(ids[a], ids[b], kind));
            }

            let related = store.find_related_entities(&ids[0], depth).unwrap();
            let mut seen = HashSet::new();
            for entry in &related.entities {
                prop_assert!(seen.insert(entry.entity.id), "duplicate {}", entry.entity.id);
                prop_assert!(entry.depth <= depth);
            }
            prop_assert_eq!(related.entities[0].entity.id, ids[0]);
            for path in &related.relationship_paths {
                prop_assert_eq!(path.relationships.len(), path.depth);
            }
        }
    }
}
