//! Relation triplets with temporal validity.

use crate::id::{EntityId, TripletId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed vocabulary of relation predicates.
///
/// Keeping this enumerated bounds the graph schema; extractor output naming
/// anything outside the set is skipped, never stored as a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Predicate {
    /// "Gandalf IS_A wizard"
    IsA,
    /// "Aragorn HOLDS_TITLE King of Gondor"
    HoldsTitle,
    /// "Harry MEMBER_OF Gryffindor"
    MemberOf,
    /// "Daenerys LEADS the Unsullied"
    Leads,
    /// "Sam SERVES Frodo"
    Serves,
    /// "Clark Kent ALIAS_OF Superman"
    AliasOf,
    /// Family or kinship
    RelatedTo,
    /// Allies, friends
    AlliedWith,
    /// Rivals, opponents
    EnemyOf,
    /// Acquaintance
    Knows,
    /// "Romeo LOVES Juliet"
    Loves,
    /// "Winston FEARS rats"
    Fears,
    /// "Frodo TRUSTS Gandalf"
    Trusts,
    /// "Vader PARENT_OF Luke"
    ParentOf,
    /// "Luke CHILD_OF Vader"
    ChildOf,
    /// "Aragorn SPOUSE_OF Arwen"
    SpouseOf,
    /// "Obi-Wan MENTOR_OF Luke"
    MentorOf,
    /// "The ring LOCATED_IN Mount Doom"
    LocatedIn,
    /// "Smaug OWNS the hoard"
    Owns,
    /// "Arthur POSSESSES Excalibur"
    Possesses,
    /// "Sauron RULES_OVER Mordor"
    RulesOver,
    /// Inherent attribute; commonly self-referential
    HasTrait,
    /// "Achilles KILLED Hector"
    Killed,
    /// "Jon FOUGHT_IN the battle"
    FoughtIn,
    /// "Morgoth CREATED orcs"
    Created,
}

impl Predicate {
    /// Stable string form, matching the serialized representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::IsA => "IS_A",
            Predicate::HoldsTitle => "HOLDS_TITLE",
            Predicate::MemberOf => "MEMBER_OF",
            Predicate::Leads => "LEADS",
            Predicate::Serves => "SERVES",
            Predicate::AliasOf => "ALIAS_OF",
            Predicate::RelatedTo => "RELATED_TO",
            Predicate::AlliedWith => "ALLIED_WITH",
            Predicate::EnemyOf => "ENEMY_OF",
            Predicate::Knows => "KNOWS",
            Predicate::Loves => "LOVES",
            Predicate::Fears => "FEARS",
            Predicate::Trusts => "TRUSTS",
            Predicate::ParentOf => "PARENT_OF",
            Predicate::ChildOf => "CHILD_OF",
            Predicate::SpouseOf => "SPOUSE_OF",
            Predicate::MentorOf => "MENTOR_OF",
            Predicate::LocatedIn => "LOCATED_IN",
            Predicate::Owns => "OWNS",
            Predicate::Possesses => "POSSESSES",
            Predicate::RulesOver => "RULES_OVER",
            Predicate::HasTrait => "HAS_TRAIT",
            Predicate::Killed => "KILLED",
            Predicate::FoughtIn => "FOUGHT_IN",
            Predicate::Created => "CREATED",
        }
    }

    /// Every predicate in the vocabulary, for prompt construction
    pub fn all() -> &'static [Predicate] {
        &[
            Predicate::IsA,
            Predicate::HoldsTitle,
            Predicate::MemberOf,
            Predicate::Leads,
            Predicate::Serves,
            Predicate::AliasOf,
            Predicate::RelatedTo,
            Predicate::AlliedWith,
            Predicate::EnemyOf,
            Predicate::Knows,
            Predicate::Loves,
            Predicate::Fears,
            Predicate::Trusts,
            Predicate::ParentOf,
            Predicate::ChildOf,
            Predicate::SpouseOf,
            Predicate::MentorOf,
            Predicate::LocatedIn,
            Predicate::Owns,
            Predicate::Possesses,
            Predicate::RulesOver,
            Predicate::HasTrait,
            Predicate::Killed,
            Predicate::FoughtIn,
            Predicate::Created,
        ]
    }

    /// Parse an extractor-produced predicate string, tolerating case and
    /// spaces. Returns None for anything outside the closed set.
    pub fn parse_loose(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Predicate::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The half-open span `[start, end)` over which a triplet holds.
///
/// Times are chapter-scaled: chapter 2 begins at 2.0, and a query halfway
/// through chapter 1 uses 1.5. `end == None` means the triplet holds until
/// superseded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Validity {
    /// Inclusive start
    pub start: f64,
    /// Exclusive end; None while the triplet still holds
    pub end: Option<f64>,
}

impl Validity {
    /// An open-ended interval starting at `start`
    pub fn open(start: f64) -> Self {
        Self { start, end: None }
    }

    /// A bounded interval `[start, end)`
    pub fn bounded(start: f64, end: f64) -> Self {
        Self { start, end: Some(end) }
    }

    /// An open-ended interval starting at a chapter boundary
    pub fn from_chapter(chapter: u32) -> Self {
        Self::open(chapter as f64)
    }

    /// Whether `at` falls inside the interval
    pub fn contains(&self, at: f64) -> bool {
        at >= self.start && self.end.map_or(true, |end| at < end)
    }

    /// Whether the interval is still open-ended
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whether start/end are ordered
    pub fn is_well_formed(&self) -> bool {
        self.end.map_or(true, |end| end > self.start)
    }
}

/// A subject-predicate-object relation with temporal validity.
///
/// Self-reference (subject == object) is valid and represents inherent
/// traits; it is distinct from malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    /// Unique identifier
    pub id: TripletId,
    /// Subject entity
    pub subject: EntityId,
    /// Relation predicate
    pub predicate: Predicate,
    /// Object entity
    pub object: EntityId,
    /// Chapter the relation was extracted from
    pub chapter: u32,
    /// The span over which the relation holds
    pub validity: Validity,
}

impl Triplet {
    /// Create a triplet
    pub fn new(
        subject: EntityId,
        predicate: Predicate,
        object: EntityId,
        chapter: u32,
        validity: Validity,
    ) -> Self {
        Self { id: TripletId::new(), subject, predicate, object, chapter, validity }
    }

    /// Whether the triplet relates an entity to itself
    pub fn is_self_referential(&self) -> bool {
        self.subject == self.object
    }
}
