//! The fluency editor agent.
//!
//! A blind edit: the editor sees the translated text split into indexed
//! segments and nothing else — no source text — so its ear is not biased
//! toward source phrasing. The segment indices are the alignment map back to
//! the source paragraphs; edited segments are merged over the originals by
//! index.

use super::prompts::build_fluency_prompt;
use llm::{AgentRole, ChatMessage, LlmProvider, LlmResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<segment (\d+)>\s*(.*?)\s*</segment (\d+)>").expect("segment regex")
});

/// Translated text split into indexed segments, aligned one-to-one with the
/// source paragraphs it was translated from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMap {
    segments: BTreeMap<usize, String>,
}

impl SegmentMap {
    /// Split text into paragraph segments on blank lines
    pub fn from_text(text: &str) -> Self {
        let segments = text
            .split("\n\n")
            .enumerate()
            .map(|(i, part)| (i, part.to_string()))
            .collect();
        Self { segments }
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the map has no segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render as tagged input for the editor
    pub fn to_tagged(&self) -> String {
        let mut out = String::new();
        for (index, text) in &self.segments {
            out.push_str(&format!("<segment {index}>\n{text}\n</segment {index}>\n"));
        }
        out
    }

    /// Parse edited segments out of an editor answer. Tags with mismatched
    /// indices or indices outside the map are ignored.
    pub fn parse_edits(&self, answer: &str) -> BTreeMap<usize, String> {
        let mut edits = BTreeMap::new();
        for captures in SEGMENT_RE.captures_iter(answer) {
            let open: usize = match captures[1].parse() {
                Ok(i) => i,
                Err(_) => continue,
            };
            let close: usize = match captures[3].parse() {
                Ok(i) => i,
                Err(_) => continue,
            };
            if open != close || !self.segments.contains_key(&open) {
                continue;
            }
            edits.insert(open, captures[2].to_string());
        }
        edits
    }

    /// Merge edits over the originals and reassemble the text
    pub fn merge(mut self, edits: BTreeMap<usize, String>) -> String {
        for (index, text) in edits {
            self.segments.insert(index, text);
        }
        self.segments
            .into_values()
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Performs the final blind fluency pass
pub struct FluencyEditor {
    provider: Arc<dyn LlmProvider>,
}

impl FluencyEditor {
    /// Create a fluency editor over the given provider
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Polish a translation and return the final chapter text
    pub async fn polish(&self, translation: &str) -> LlmResult<String> {
        let map = SegmentMap::from_text(translation);
        let prompt = build_fluency_prompt(&map.to_tagged());

        let answer = self
            .provider
            .invoke(&[ChatMessage::user(prompt)], AgentRole::FluencyEditor)
            .await?;

        let edits = map.parse_edits(&answer);
        debug!(segments = map.len(), edited = edits.len(), "fluency pass merged");
        Ok(map.merge(edits))
    }
}
