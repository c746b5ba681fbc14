//! Translation-memory annotation.
//!
//! Before a chapter reaches the translator, every occurrence of an entity
//! whose localized term is already locked gets rewritten as
//! `<term> [Translation Memory <canonical form>]`. The translator keeps the
//! locked rendering; the bracket tells it where the term came from.
//!
//! Idempotence is tracked through applied-span records, not pattern
//! re-matching: a second pass sees the recorded spans and leaves them alone,
//! so look-alike substrings inside an annotation are never annotated again.

use crate::error::GraphResult;
use crate::graph::KnowledgeGraph;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A region of the text that already carries an annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSpan {
    /// Byte offset of the annotation start
    pub start: usize,
    /// Byte offset one past the annotation end
    pub end: usize,
    /// Entity the annotation belongs to
    pub entity_id: EntityId,
}

/// Chapter text together with its annotation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedText {
    /// The (possibly annotated) text
    pub text: String,
    /// Regions already annotated, sorted by start
    pub spans: Vec<AppliedSpan>,
}

impl AnnotatedText {
    /// Wrap raw source text with no annotations applied yet
    pub fn source(text: impl Into<String>) -> Self {
        Self { text: text.into(), spans: Vec::new() }
    }

    fn covered(&self, start: usize, end: usize) -> bool {
        self.spans.iter().any(|s| start < s.end && end > s.start)
    }
}

struct Rule {
    alias: String,
    term: String,
    canonical: String,
    entity_id: EntityId,
}

/// Rewrites locked terminology into chapter text
pub struct TermAnnotator {
    graph: Arc<dyn KnowledgeGraph>,
}

impl TermAnnotator {
    /// Create an annotator over the given graph
    pub fn new(graph: Arc<dyn KnowledgeGraph>) -> Self {
        Self { graph }
    }

    /// Annotate every locked-term occurrence visible as of `chapter`.
    ///
    /// Entries locked in a later chapter are invisible. Re-running on the
    /// returned value is a no-op.
    pub async fn annotate(&self, input: AnnotatedText, chapter: u32) -> GraphResult<AnnotatedText> {
        let mut rules = Vec::new();
        for entity in self.graph.entities().await? {
            let Some(entry) = self
                .graph
                .query_translation_memory(entity.id, chapter)
                .await?
            else {
                continue;
            };
            for name in entity.all_names() {
                rules.push(Rule {
                    alias: name.to_string(),
                    term: entry.term.clone(),
                    canonical: entity.canonical_name.clone(),
                    entity_id: entity.id,
                });
            }
        }
        // Longest alias wins when one is a prefix of another.
        rules.sort_by(|a, b| b.alias.len().cmp(&a.alias.len()));

        Ok(apply_rules(input, &rules))
    }
}

fn collect_matches<'r>(input: &AnnotatedText, rules: &'r [Rule]) -> Vec<(usize, usize, &'r Rule)> {
    let text = &input.text;
    let mut matches: Vec<(usize, usize, &Rule)> = Vec::new();
    for rule in rules {
        if rule.alias.is_empty() {
            continue;
        }
        for (start, found) in text.match_indices(rule.alias.as_str()) {
            let end = start + found.len();
            if !boundary_ok(text, start, end) {
                continue;
            }
            if input.covered(start, end) {
                continue;
            }
            if matches.iter().any(|(s, e, _)| start < *e && end > *s) {
                continue;
            }
            matches.push((start, end, rule));
        }
    }
    matches.sort_by_key(|(start, _, _)| *start);
    matches
}

fn apply_rules(input: AnnotatedText, rules: &[Rule]) -> AnnotatedText {
    let matches = collect_matches(&input, rules);
    if matches.is_empty() {
        return input;
    }
    debug!(count = matches.len(), "applying translation-memory annotations");

    let text = &input.text;
    let mut out = String::with_capacity(text.len());
    let mut spans: Vec<AppliedSpan> = Vec::new();
    let mut old_spans = input.spans.iter().peekable();
    let mut cursor = 0usize;

    for (start, end, rule) in matches {
        // Re-offset annotations that precede this match.
        while let Some(&span) = old_spans.peek() {
            if span.start >= start {
                break;
            }
            old_spans.next();
            let shift = out.len() as isize - cursor as isize;
            spans.push(AppliedSpan {
                start: (span.start as isize + shift) as usize,
                end: (span.end as isize + shift) as usize,
                entity_id: span.entity_id,
            });
        }

        out.push_str(&text[cursor..start]);
        let span_start = out.len();
        out.push_str(&rule.term);
        out.push_str(" [Translation Memory ");
        out.push_str(&rule.canonical);
        out.push(']');
        spans.push(AppliedSpan { start: span_start, end: out.len(), entity_id: rule.entity_id });
        cursor = end;
    }

    let tail_shift = out.len() as isize - cursor as isize;
    for span in old_spans {
        spans.push(AppliedSpan {
            start: (span.start as isize + tail_shift) as usize,
            end: (span.end as isize + tail_shift) as usize,
            entity_id: span.entity_id,
        });
    }
    out.push_str(&text[cursor..]);

    spans.sort_by_key(|s| s.start);
    AnnotatedText { text: out, spans }
}

/// Word-boundary check for alphabetic scripts. CJK names embed without
/// delimiters, so the check only applies to ASCII-word edges.
fn boundary_ok(text: &str, start: usize, end: usize) -> bool {
    let ascii_word = |c: char| c.is_ascii_alphanumeric() || c == '_';

    let first = text[start..end].chars().next();
    let last = text[start..end].chars().next_back();

    let clear_before = !first.map_or(false, |c| c.is_ascii_alphanumeric())
        || text[..start].chars().next_back().map_or(true, |c| !ascii_word(c));
    let clear_after = !last.map_or(false, |c| c.is_ascii_alphanumeric())
        || text[end..].chars().next().map_or(true, |c| !ascii_word(c));

    clear_before && clear_after
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Alias, Entity, EntityType, MemoryGraph};

    async fn graph_with_locked_term() -> (Arc<MemoryGraph>, EntityId) {
        let graph = Arc::new(MemoryGraph::new());
        let mut entity = Entity::new("Joshua", EntityType::Person, 1);
        entity.add_alias(Alias::weak("the tailor", 1));
        let id = graph.upsert_entity(entity).await.unwrap();
        graph.lock_term(id, "约书亚", 1).await.unwrap();
        (graph, id)
    }

    #[tokio::test]
    async fn test_annotates_locked_occurrence() {
        let (graph, _) = graph_with_locked_term().await;
        let annotator = TermAnnotator::new(graph);

        let result = annotator
            .annotate(AnnotatedText::source("Joshua went to the store."), 2)
            .await
            .unwrap();

        assert_eq!(result.text, "约书亚 [Translation Memory Joshua] went to the store.");
        assert_eq!(result.spans.len(), 1);
    }

    #[tokio::test]
    async fn test_idempotent_fixed_point() {
        let (graph, _) = graph_with_locked_term().await;
        let annotator = TermAnnotator::new(graph);

        let once = annotator
            .annotate(AnnotatedText::source("Joshua met Joshua's brother."), 2)
            .await
            .unwrap();
        let twice = annotator.annotate(once.clone(), 2).await.unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_temporal_gating_hides_future_locks() {
        let graph = Arc::new(MemoryGraph::new());
        let entity = Entity::new("Audrey", EntityType::Person, 5);
        let id = graph.upsert_entity(entity).await.unwrap();
        graph.lock_term(id, "奥黛丽", 5).await.unwrap();

        let annotator = TermAnnotator::new(graph);
        let early = annotator
            .annotate(AnnotatedText::source("Audrey smiled."), 3)
            .await
            .unwrap();
        assert_eq!(early.text, "Audrey smiled.");

        let later = annotator
            .annotate(AnnotatedText::source("Audrey smiled."), 5)
            .await
            .unwrap();
        assert!(later.text.contains("[Translation Memory Audrey]"));
    }

    #[tokio::test]
    async fn test_word_boundary_blocks_substring_match() {
        let graph = Arc::new(MemoryGraph::new());
        let entity = Entity::new("Ann", EntityType::Person, 1);
        let id = graph.upsert_entity(entity).await.unwrap();
        graph.lock_term(id, "安", 1).await.unwrap();

        let annotator = TermAnnotator::new(graph);
        let result = annotator
            .annotate(AnnotatedText::source("Anna spoke to Ann."), 1)
            .await
            .unwrap();

        assert_eq!(result.text, "Anna spoke to 安 [Translation Memory Ann].");
    }

    #[tokio::test]
    async fn test_longest_alias_wins() {
        let graph = Arc::new(MemoryGraph::new());
        let mut entity = Entity::new("Klein Moretti", EntityType::Person, 1);
        entity.add_alias(Alias::strong("Klein", 1));
        let id = graph.upsert_entity(entity).await.unwrap();
        graph.lock_term(id, "克莱恩·莫雷蒂", 1).await.unwrap();

        let annotator = TermAnnotator::new(graph);
        let result = annotator
            .annotate(AnnotatedText::source("Klein Moretti nodded."), 1)
            .await
            .unwrap();

        assert_eq!(
            result.text,
            "克莱恩·莫雷蒂 [Translation Memory Klein Moretti] nodded."
        );
    }
}
