//! In-memory knowledge graph store.
//!
//! The reference implementation of [`KnowledgeGraph`]: a single
//! reader-writer lock over the whole graph, so every mutation is atomic and
//! a triplet can never observe a half-committed entity. Production
//! deployments put a real graph database behind the same trait.

use super::entity::{Alias, Entity, RenameEvent, TranslationMemoryEntry};
use super::triplet::{Predicate, Triplet, Validity};
use super::KnowledgeGraph;
use crate::error::{GraphError, GraphResult};
use crate::id::{EntityId, TripletId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct GraphInner {
    entities: HashMap<EntityId, Entity>,
    /// Lowercased alias -> entity ids carrying it
    alias_index: HashMap<String, BTreeSet<EntityId>>,
    triplets: Vec<Triplet>,
    memory: HashMap<EntityId, TranslationMemoryEntry>,
    renames: HashMap<EntityId, Vec<RenameEvent>>,
    sequence: u64,
}

impl GraphInner {
    fn index_alias(&mut self, name: &str, id: EntityId) {
        self.alias_index
            .entry(name.to_lowercase())
            .or_default()
            .insert(id);
    }

    fn require_entity(&self, id: EntityId) -> GraphResult<&Entity> {
        self.entities.get(&id).ok_or(GraphError::EntityNotFound(id))
    }
}

/// An in-memory [`KnowledgeGraph`] implementation
#[derive(Default)]
pub struct MemoryGraph {
    inner: RwLock<GraphInner>,
}

impl MemoryGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities currently stored
    pub async fn entity_count(&self) -> usize {
        self.inner.read().await.entities.len()
    }

    /// Number of triplets currently stored
    pub async fn triplet_count(&self) -> usize {
        self.inner.read().await.triplets.len()
    }
}

#[async_trait]
impl KnowledgeGraph for MemoryGraph {
    async fn upsert_entity(&self, entity: Entity) -> GraphResult<EntityId> {
        let mut inner = self.inner.write().await;
        let id = entity.id;

        match inner.entities.entry(id) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                for alias in &entity.aliases {
                    existing.add_alias(alias.clone());
                }
                for chapter in &entity.chapters {
                    existing.record_chapter(*chapter);
                }
                if entity.first_seen < existing.first_seen {
                    existing.first_seen = entity.first_seen;
                }
                if existing.description.is_empty() {
                    existing.description = entity.description.clone();
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entity.clone());
            }
        }

        for alias in &entity.aliases {
            inner.index_alias(&alias.name, id);
        }
        inner.index_alias(&entity.canonical_name, id);

        debug!(entity = %entity.canonical_name, %id, "entity committed");
        Ok(id)
    }

    async fn upsert_alias(&self, entity_id: EntityId, alias: Alias) -> GraphResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_entity(entity_id)?;

        let name = alias.name.clone();
        if let Some(entity) = inner.entities.get_mut(&entity_id) {
            entity.add_alias(alias);
        }
        inner.index_alias(&name, entity_id);
        Ok(())
    }

    async fn rename_entity(
        &self,
        entity_id: EntityId,
        new_name: &str,
        chapter: u32,
    ) -> GraphResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_entity(entity_id)?;

        inner.sequence += 1;
        let sequence = inner.sequence;

        let old_name = inner.entities[&entity_id].canonical_name.clone();
        inner.renames.entry(entity_id).or_default().push(RenameEvent {
            entity_id,
            old_name: old_name.clone(),
            new_name: new_name.to_string(),
            chapter,
            sequence,
            at: Utc::now(),
        });

        if let Some(entity) = inner.entities.get_mut(&entity_id) {
            entity.canonical_name = new_name.to_string();
            entity.add_alias(Alias::strong(new_name, chapter));
        }
        inner.index_alias(new_name, entity_id);

        debug!(%entity_id, %old_name, %new_name, chapter, "entity renamed");
        Ok(())
    }

    async fn insert_triplet(
        &self,
        subject: EntityId,
        predicate: Predicate,
        object: EntityId,
        chapter: u32,
        validity: Validity,
    ) -> GraphResult<TripletId> {
        if !validity.is_well_formed() {
            return Err(GraphError::InvalidValidity {
                start: validity.start,
                end: validity.end.unwrap_or(validity.start),
            });
        }

        let mut inner = self.inner.write().await;
        if !inner.entities.contains_key(&subject) {
            return Err(GraphError::UncommittedReference(subject));
        }
        if !inner.entities.contains_key(&object) {
            return Err(GraphError::UncommittedReference(object));
        }

        // Supersede: close any still-open relation with the same subject and
        // predicate that started earlier.
        for existing in inner
            .triplets
            .iter_mut()
            .filter(|t| t.subject == subject && t.predicate == predicate)
        {
            if existing.validity.is_open() && existing.validity.start < validity.start {
                existing.validity.end = Some(validity.start);
                debug!(
                    triplet = %existing.id,
                    closed_at = validity.start,
                    "superseded open triplet"
                );
            }
        }

        let triplet = Triplet::new(subject, predicate, object, chapter, validity);
        let id = triplet.id;
        inner.triplets.push(triplet);
        Ok(id)
    }

    async fn query_entities_by_alias(&self, alias: &str) -> GraphResult<Vec<Entity>> {
        let inner = self.inner.read().await;
        let Some(ids) = inner.alias_index.get(&alias.to_lowercase()) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| inner.entities.get(id))
            .cloned()
            .collect())
    }

    async fn lock_term(&self, entity_id: EntityId, term: &str, chapter: u32) -> GraphResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_entity(entity_id)?;

        inner.memory.entry(entity_id).or_insert_with(|| TranslationMemoryEntry {
            entity_id,
            term: term.to_string(),
            locked_chapter: chapter,
        });
        Ok(())
    }

    async fn query_translation_memory(
        &self,
        entity_id: EntityId,
        as_of_chapter: u32,
    ) -> GraphResult<Option<TranslationMemoryEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .memory
            .get(&entity_id)
            .filter(|entry| entry.locked_chapter <= as_of_chapter)
            .cloned())
    }

    async fn query_triplets(&self, subject: EntityId, as_of: f64) -> GraphResult<Vec<Triplet>> {
        let inner = self.inner.read().await;
        Ok(inner
            .triplets
            .iter()
            .filter(|t| t.subject == subject && t.validity.contains(as_of))
            .cloned()
            .collect())
    }

    async fn entities(&self) -> GraphResult<Vec<Entity>> {
        let inner = self.inner.read().await;
        Ok(inner.entities.values().cloned().collect())
    }

    async fn rename_history(&self, entity_id: EntityId) -> GraphResult<Vec<RenameEvent>> {
        let inner = self.inner.read().await;
        inner.require_entity(entity_id)?;
        Ok(inner.renames.get(&entity_id).cloned().unwrap_or_default())
    }

    async fn canonical_name_at(
        &self,
        entity_id: EntityId,
        as_of_chapter: u32,
    ) -> GraphResult<String> {
        let inner = self.inner.read().await;
        let entity = inner.require_entity(entity_id)?;

        let Some(events) = inner.renames.get(&entity_id) else {
            return Ok(entity.canonical_name.clone());
        };

        // Events are append-only and sequence-ordered; the name as of a
        // chapter is the original name with every event at or before that
        // chapter applied.
        let mut name = events
            .first()
            .map(|e| e.old_name.clone())
            .unwrap_or_else(|| entity.canonical_name.clone());
        for event in events.iter().filter(|e| e.chapter <= as_of_chapter) {
            name = event.new_name.clone();
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityType;

    fn entity(name: &str, chapter: u32) -> Entity {
        Entity::new(name, EntityType::Person, chapter)
    }

    #[tokio::test]
    async fn test_triplet_requires_committed_endpoints() {
        let graph = MemoryGraph::new();
        let committed = entity("Klein", 1);
        let committed_id = graph.upsert_entity(committed).await.unwrap();

        let err = graph
            .insert_triplet(
                committed_id,
                Predicate::Knows,
                EntityId::new(),
                1,
                Validity::from_chapter(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::UncommittedReference(_)));
    }

    #[tokio::test]
    async fn test_alias_query_is_case_insensitive() {
        let graph = MemoryGraph::new();
        let id = graph.upsert_entity(entity("Klein Moretti", 1)).await.unwrap();

        let found = graph.query_entities_by_alias("klein moretti").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }

    #[tokio::test]
    async fn test_supersedence_closes_open_interval() {
        let graph = MemoryGraph::new();
        let a = graph.upsert_entity(entity("A", 1)).await.unwrap();
        let b = graph.upsert_entity(entity("B", 1)).await.unwrap();
        let c = graph.upsert_entity(entity("C", 2)).await.unwrap();

        graph
            .insert_triplet(a, Predicate::AlliedWith, b, 1, Validity::from_chapter(1))
            .await
            .unwrap();
        graph
            .insert_triplet(a, Predicate::AlliedWith, c, 2, Validity::from_chapter(2))
            .await
            .unwrap();

        let early = graph.query_triplets(a, 1.5).await.unwrap();
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].object, b);

        let late = graph.query_triplets(a, 2.5).await.unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].object, c);
    }

    #[tokio::test]
    async fn test_translation_memory_first_lock_wins() {
        let graph = MemoryGraph::new();
        let id = graph.upsert_entity(entity("Klein", 1)).await.unwrap();

        graph.lock_term(id, "克莱恩", 1).await.unwrap();
        graph.lock_term(id, "凯琳", 4).await.unwrap();

        let entry = graph.query_translation_memory(id, 5).await.unwrap().unwrap();
        assert_eq!(entry.term, "克莱恩");
        assert_eq!(entry.locked_chapter, 1);
    }

    #[tokio::test]
    async fn test_translation_memory_temporal_gating() {
        let graph = MemoryGraph::new();
        let id = graph.upsert_entity(entity("Audrey", 3)).await.unwrap();
        graph.lock_term(id, "奥黛丽", 3).await.unwrap();

        assert!(graph.query_translation_memory(id, 2).await.unwrap().is_none());
        assert!(graph.query_translation_memory(id, 3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_canonical_name_tracks_rename_history() {
        let graph = MemoryGraph::new();
        let id = graph.upsert_entity(entity("Klein", 1)).await.unwrap();
        graph.rename_entity(id, "The Fool", 2).await.unwrap();

        assert_eq!(graph.canonical_name_at(id, 1).await.unwrap(), "Klein");
        assert_eq!(graph.canonical_name_at(id, 2).await.unwrap(), "The Fool");
        assert_eq!(graph.canonical_name_at(id, 9).await.unwrap(), "The Fool");
    }
}
