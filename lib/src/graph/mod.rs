//! Knowledge graph model and store contract.
//!
//! The graph is the only durable state in the system: canonical entities,
//! their aliases and rename history, temporally valid relation triplets, and
//! locked translation-memory terms. Persistence engines live behind the
//! [`KnowledgeGraph`] trait; an in-memory implementation ships in-tree and
//! doubles as the test store.

mod entity;
mod memory;
mod triplet;

pub use entity::{Alias, AliasStrength, Entity, EntityType, RenameEvent, TranslationMemoryEntry};
pub use memory::MemoryGraph;
pub use triplet::{Predicate, Triplet, Validity};

use crate::error::GraphResult;
use crate::id::{EntityId, TripletId};
use async_trait::async_trait;

/// Mutation and query contract for the knowledge graph store.
///
/// Every mutation is transactional. Entities must commit before any triplet
/// referencing them; implementations reject dangling references rather than
/// storing them.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// Insert an entity, or merge into the stored record with the same id
    async fn upsert_entity(&self, entity: Entity) -> GraphResult<EntityId>;

    /// Attach an alias to an existing entity
    async fn upsert_alias(&self, entity_id: EntityId, alias: Alias) -> GraphResult<()>;

    /// Append a rename event and update the canonical name.
    ///
    /// The old name stays behind as an alias; triplets recorded before the
    /// rename are never rewritten.
    async fn rename_entity(
        &self,
        entity_id: EntityId,
        new_name: &str,
        chapter: u32,
    ) -> GraphResult<()>;

    /// Insert a triplet. Both endpoints must already be committed.
    ///
    /// An open-ended triplet with the same subject and predicate whose
    /// interval started earlier is closed at the new interval's start, so a
    /// later contradictory relation supersedes instead of overwriting.
    async fn insert_triplet(
        &self,
        subject: EntityId,
        predicate: Predicate,
        object: EntityId,
        chapter: u32,
        validity: Validity,
    ) -> GraphResult<TripletId>;

    /// Find entities carrying the given alias (case-insensitive)
    async fn query_entities_by_alias(&self, alias: &str) -> GraphResult<Vec<Entity>>;

    /// Lock a localized term for an entity. First lock wins; later calls for
    /// the same entity are no-ops.
    async fn lock_term(&self, entity_id: EntityId, term: &str, chapter: u32) -> GraphResult<()>;

    /// The locked term for an entity, if it was locked at or before
    /// `as_of_chapter` (temporal gating)
    async fn query_translation_memory(
        &self,
        entity_id: EntityId,
        as_of_chapter: u32,
    ) -> GraphResult<Option<TranslationMemoryEntry>>;

    /// Triplets with the given subject whose validity interval contains
    /// `as_of`
    async fn query_triplets(&self, subject: EntityId, as_of: f64) -> GraphResult<Vec<Triplet>>;

    /// All entities currently in the graph
    async fn entities(&self) -> GraphResult<Vec<Entity>>;

    /// The append-only rename history of an entity, oldest first
    async fn rename_history(&self, entity_id: EntityId) -> GraphResult<Vec<RenameEvent>>;

    /// The canonical name an entity carried as of a chapter, reconstructed
    /// from the rename history
    async fn canonical_name_at(&self, entity_id: EntityId, as_of_chapter: u32)
        -> GraphResult<String>;
}
