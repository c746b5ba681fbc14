//! Entity mention and triplet extraction.
//!
//! One provider call per chapter turns prose into raw mentions and raw
//! triplets. Nothing here is canonical yet: mentions are surface forms, and
//! triplet endpoints are names, not ids. The resolver owns canonicalization.
//!
//! The extractor is strict about the closed vocabularies: an unknown entity
//! type or predicate in an otherwise valid payload is skipped with a warning
//! rather than stored, and a payload that is not JSON at all is a permanent
//! provider failure for the chapter.

use crate::error::{ExtractError, ExtractResult};
use crate::graph::{EntityType, Predicate, Validity};
use crate::language::Language;
use crate::style::StyleGuide;
use llm::{AgentRole, ChatMessage, LlmProvider};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// A not-yet-canonicalized entity mention
#[derive(Debug, Clone)]
pub struct RawMention {
    /// Primary surface form
    pub name: String,
    /// Entity kind
    pub entity_type: EntityType,
    /// Short description from the text
    pub description: String,
    /// Other proper names for the same referent in this chapter
    pub aliases: Vec<String>,
    /// Coreference forms and epithets; never merge evidence
    pub weak_aliases: Vec<String>,
    /// Suggested localized rendering, locked on first creation
    pub suggested_term: Option<String>,
    /// Explicit rename: the name this referent was previously known by
    pub renamed_from: Option<String>,
}

/// A not-yet-canonicalized relation between two mention names
#[derive(Debug, Clone)]
pub struct RawTriplet {
    /// Subject surface form
    pub subject: String,
    /// Relation predicate
    pub predicate: Predicate,
    /// Object surface form; may equal the subject for inherent traits
    pub object: String,
    /// Span over which the relation holds
    pub validity: Validity,
}

/// Everything extracted from one chapter
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Raw mentions, in order of first appearance
    pub mentions: Vec<RawMention>,
    /// Raw triplets referencing mention names
    pub triplets: Vec<RawTriplet>,
}

// Wire format for the provider's JSON payload. Kept separate from the
// public types so vocabulary validation happens in exactly one place.

#[derive(Deserialize)]
struct ExtractionWire {
    #[serde(default)]
    entities: Vec<MentionWire>,
    #[serde(default)]
    triplets: Vec<TripletWire>,
}

#[derive(Deserialize)]
struct MentionWire {
    name: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    weak_aliases: Vec<String>,
    #[serde(default)]
    suggested_translation: Option<String>,
    #[serde(default)]
    renamed_from: Option<String>,
}

#[derive(Deserialize)]
struct TripletWire {
    subject: String,
    predicate: String,
    object: String,
}

/// Extract the JSON object from a provider answer, tolerating markdown code
/// fences and prose around the payload.
pub(crate) fn json_payload(answer: &str) -> &str {
    let trimmed = answer.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.rsplit_once("```"))
        .map(|(body, _)| body.trim())
        .unwrap_or(trimmed);

    match (inner.find('{'), inner.rfind('}')) {
        (Some(open), Some(close)) if close > open => &inner[open..=close],
        _ => inner,
    }
}

/// Turns chapter text into raw mentions and triplets
pub struct ChapterExtractor {
    provider: Arc<dyn LlmProvider>,
}

impl ChapterExtractor {
    /// Create an extractor over the given provider
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Extract mentions and triplets from one chapter
    pub async fn extract(
        &self,
        text: &str,
        style: &StyleGuide,
        language: Language,
        chapter: u32,
    ) -> ExtractResult<Extraction> {
        let prompt = build_extraction_prompt(text, style, language);
        let answer = self
            .provider
            .invoke(&[ChatMessage::user(prompt)], AgentRole::Extractor)
            .await?;

        let wire: ExtractionWire = serde_json::from_str(json_payload(&answer))
            .map_err(|e| ExtractError::Payload(format!("chapter {chapter}: {e}")))?;

        let mut extraction = Extraction::default();

        for mention in wire.entities {
            let Some(entity_type) = EntityType::parse_loose(&mention.entity_type) else {
                warn!(
                    chapter,
                    name = %mention.name,
                    kind = %mention.entity_type,
                    "mention type outside the closed set, skipping"
                );
                continue;
            };
            if mention.name.trim().is_empty() {
                warn!(chapter, "mention with empty name, skipping");
                continue;
            }
            extraction.mentions.push(RawMention {
                name: mention.name,
                entity_type,
                description: mention.description,
                aliases: mention.aliases,
                weak_aliases: mention.weak_aliases,
                suggested_term: mention.suggested_translation,
                renamed_from: mention.renamed_from,
            });
        }

        for triplet in wire.triplets {
            let Some(predicate) = Predicate::parse_loose(&triplet.predicate) else {
                warn!(
                    chapter,
                    predicate = %triplet.predicate,
                    "predicate outside the closed set, skipping"
                );
                continue;
            };
            // Empty endpoints are malformed; self-reference is not.
            if triplet.subject.trim().is_empty() || triplet.object.trim().is_empty() {
                warn!(chapter, "triplet with empty endpoint, skipping");
                continue;
            }
            extraction.triplets.push(RawTriplet {
                subject: triplet.subject,
                predicate,
                object: triplet.object,
                validity: Validity::from_chapter(chapter),
            });
        }

        Ok(extraction)
    }
}

fn build_extraction_prompt(text: &str, style: &StyleGuide, language: Language) -> String {
    let predicates = Predicate::all()
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a meticulous knowledge-graph architect working on a {language} novel.\n\
         Extract durable facts, not scene summaries: identities, roles, \
         relationships, possessions. Ignore one-off actions and temporary \
         conditions.\n\n\
         Style context:\n{style}\n\
         Respond with JSON only, in this shape:\n\
         {{\n\
           \"entities\": [{{\"name\": \"...\", \"type\": \"person|place|organization|item|concept\",\n\
             \"description\": \"...\", \"aliases\": [...], \"weak_aliases\": [...],\n\
             \"suggested_translation\": \"...\", \"renamed_from\": null}}],\n\
           \"triplets\": [{{\"subject\": \"...\", \"predicate\": \"...\", \"object\": \"...\"}}]\n\
         }}\n\
         Rules:\n\
         - aliases are other proper names for the same referent; weak_aliases are \
           epithets and resolved pronouns\n\
         - renamed_from is set only when the text itself establishes a new name \
           for a previously named referent\n\
         - predicates must come from this list and nothing else: {predicates}\n\
         - subject and object must be entity names from your entities list; an \
           inherent trait may relate an entity to itself\n\n\
         === Chapter text ===\n{text}\n\n=== Your JSON response ===",
        language = language,
        style = style.render(),
    )
}
