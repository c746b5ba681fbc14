//! Canonical entities, aliases, rename events, and translation-memory
//! entries.

use crate::id::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The kind of thing a canonical entity refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Characters and other people
    Person,
    /// Cities, realms, buildings
    Place,
    /// Governments, sects, societies
    Organization,
    /// Objects, weapons, artifacts
    Item,
    /// Abstract ideas, powers, cultural notions
    Concept,
}

impl EntityType {
    /// Stable string form used in prompts and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Place => "place",
            EntityType::Organization => "organization",
            EntityType::Item => "item",
            EntityType::Concept => "concept",
        }
    }

    /// Parse an extractor-produced type string, tolerating case and a few
    /// common synonyms. Returns None for anything outside the closed set.
    pub fn parse_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "person" | "character" => Some(EntityType::Person),
            "place" | "location" => Some(EntityType::Place),
            "organization" | "organisation" | "group" => Some(EntityType::Organization),
            "item" | "object" => Some(EntityType::Item),
            "concept" => Some(EntityType::Concept),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much weight an alias carries during resolution.
///
/// Weak aliases (pronouns resolved by coreference, one-off epithets) never
/// seed cross-chapter merges on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasStrength {
    /// A proper name; participates in merge decisions
    Strong,
    /// An epithet or coreference; resolvable but never merge evidence
    Weak,
}

/// A single name an entity is known by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// The surface form
    pub name: String,
    /// Merge weight
    pub strength: AliasStrength,
    /// Chapter the alias was first seen in
    pub chapter: u32,
}

impl Alias {
    /// Create a strong alias
    pub fn strong(name: impl Into<String>, chapter: u32) -> Self {
        Self { name: name.into(), strength: AliasStrength::Strong, chapter }
    }

    /// Create a weak alias
    pub fn weak(name: impl Into<String>, chapter: u32) -> Self {
        Self { name: name.into(), strength: AliasStrength::Weak, chapter }
    }
}

/// A canonical, deduplicated identity for a set of textual mentions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: EntityId,
    /// Current canonical name (renames update this; history is kept)
    pub canonical_name: String,
    /// What kind of entity this is
    pub entity_type: EntityType,
    /// Free-text description accumulated from extraction
    pub description: String,
    /// All names this entity is known by
    pub aliases: Vec<Alias>,
    /// Chapter the entity first appeared in
    pub first_seen: u32,
    /// Every chapter the entity has appeared in
    pub chapters: BTreeSet<u32>,
}

impl Entity {
    /// Create an entity first seen in `chapter`, with its canonical name as
    /// a strong alias
    pub fn new(name: impl Into<String>, entity_type: EntityType, chapter: u32) -> Self {
        let name = name.into();
        let mut chapters = BTreeSet::new();
        chapters.insert(chapter);
        Self {
            id: EntityId::new(),
            canonical_name: name.clone(),
            entity_type,
            description: String::new(),
            aliases: vec![Alias::strong(name, chapter)],
            first_seen: chapter,
            chapters,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an alias, ignoring case-insensitive duplicates
    pub fn add_alias(&mut self, alias: Alias) {
        if !self.has_alias(&alias.name) {
            self.aliases.push(alias);
        }
    }

    /// Whether any alias matches the name, case-insensitively
    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// All strong alias surface forms
    pub fn strong_names(&self) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|a| a.strength == AliasStrength::Strong)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// All alias surface forms
    pub fn all_names(&self) -> Vec<&str> {
        self.aliases.iter().map(|a| a.name.as_str()).collect()
    }

    /// Record an appearance in a chapter
    pub fn record_chapter(&mut self, chapter: u32) {
        self.chapters.insert(chapter);
    }
}

/// An append-only record of a canonical rename.
///
/// Events are never mutated, only superseded by later events with a higher
/// sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameEvent {
    /// Entity the rename applies to
    pub entity_id: EntityId,
    /// Canonical name before the rename
    pub old_name: String,
    /// Canonical name after the rename
    pub new_name: String,
    /// Chapter the rename occurred in
    pub chapter: u32,
    /// Monotonic ordering across all rename events in the store
    pub sequence: u64,
    /// Wall-clock insertion time
    pub at: DateTime<Utc>,
}

/// A locked localized rendering for an entity.
///
/// Visible only from `locked_chapter` onward; chapters processed before the
/// lock never see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationMemoryEntry {
    /// Entity the term belongs to
    pub entity_id: EntityId,
    /// The locked localized term
    pub term: String,
    /// Chapter the term was first locked in
    pub locked_chapter: u32,
}
