//! Per-document style guide composition.
//!
//! The style guide is produced once per document by the style architect and
//! is read-only afterwards; every downstream prompt quotes it.

use crate::extract::json_payload;
use llm::{AgentRole, ChatMessage, LlmError, LlmProvider, LlmResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// The closed set of genre tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    /// Secondary-world or urban fantasy
    Fantasy,
    /// Science fiction
    ScienceFiction,
    /// Romance
    Romance,
    /// Mystery and detective fiction
    Mystery,
    /// Horror
    Horror,
    /// Historical fiction
    Historical,
    /// Adventure
    Adventure,
    /// Martial-arts and cultivation fiction
    Wuxia,
    /// Low-stakes everyday fiction
    SliceOfLife,
    /// Thriller
    Thriller,
}

impl Genre {
    /// Human-readable name, used in prompts
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fantasy => "fantasy",
            Genre::ScienceFiction => "science fiction",
            Genre::Romance => "romance",
            Genre::Mystery => "mystery",
            Genre::Horror => "horror",
            Genre::Historical => "historical",
            Genre::Adventure => "adventure",
            Genre::Wuxia => "wuxia",
            Genre::SliceOfLife => "slice of life",
            Genre::Thriller => "thriller",
        }
    }

    /// Every genre tag
    pub fn all() -> &'static [Genre] {
        &[
            Genre::Fantasy,
            Genre::ScienceFiction,
            Genre::Romance,
            Genre::Mystery,
            Genre::Horror,
            Genre::Historical,
            Genre::Adventure,
            Genre::Wuxia,
            Genre::SliceOfLife,
            Genre::Thriller,
        ]
    }

    /// Parse a classifier answer, tolerating case, hyphens, and underscores
    pub fn parse_loose(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        Genre::all()
            .iter()
            .copied()
            .find(|g| g.as_str() == normalized)
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tone and terminology directives for a document, composed once and
/// consumed read-only by every translation prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleGuide {
    /// Genre tags the document was classified under
    pub genres: Vec<Genre>,
    /// Free-text tone directives
    pub tone: String,
    /// Terminology preferences (register, honorifics, naming conventions)
    pub terminology: Vec<String>,
}

impl StyleGuide {
    /// Render the guide as prompt text
    pub fn render(&self) -> String {
        let genres = self
            .genres
            .iter()
            .map(|g| g.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut out = format!("Genres: {genres}\nTone: {}", self.tone);
        if !self.terminology.is_empty() {
            out.push_str("\nTerminology preferences:\n");
            for pref in &self.terminology {
                out.push_str("- ");
                out.push_str(pref);
                out.push('\n');
            }
        }
        out
    }
}

#[derive(Deserialize)]
struct StyleWire {
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    tone: String,
    #[serde(default)]
    terminology: Vec<String>,
}

/// Composes the per-document style guide with one provider call
pub struct StyleArchitect {
    provider: Arc<dyn LlmProvider>,
}

impl StyleArchitect {
    /// Create a style architect over the given provider
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Classify the document and compose its style guide
    pub async fn compose(&self, sample: &str) -> LlmResult<StyleGuide> {
        let genre_options = Genre::all()
            .iter()
            .map(|g| g.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let excerpt: String = sample.chars().take(4000).collect();

        let prompt = format!(
            "You are an experienced literary annotator preparing a style guide \
             for the translators of a novel.\n\
             Classify the excerpt below and respond with JSON only:\n\
             {{\"genres\": [...], \"tone\": \"...\", \"terminology\": [...]}}\n\
             Genres must come from this list and nothing else: {genre_options}.\n\
             Tone is one or two sentences of voice directives.\n\
             Terminology lists register or naming conventions translators must keep.\n\n\
             === Excerpt ===\n{excerpt}\n\n=== Your JSON response ==="
        );

        let answer = self
            .provider
            .invoke(&[ChatMessage::user(prompt)], AgentRole::StyleArchitect)
            .await?;

        let wire: StyleWire = serde_json::from_str(json_payload(&answer))
            .map_err(|e| LlmError::Parse(format!("style guide payload: {e}")))?;

        let genres: Vec<Genre> = wire
            .genres
            .iter()
            .filter_map(|g| {
                let parsed = Genre::parse_loose(g);
                if parsed.is_none() {
                    warn!(genre = %g, "classifier answered outside the genre set, dropping");
                }
                parsed
            })
            .collect();

        Ok(StyleGuide { genres, tone: wire.tone, terminology: wire.terminology })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::mock::MockProvider;

    #[test]
    fn test_genre_parse_loose() {
        assert_eq!(Genre::parse_loose("Science-Fiction"), Some(Genre::ScienceFiction));
        assert_eq!(Genre::parse_loose("WUXIA"), Some(Genre::Wuxia));
        assert_eq!(Genre::parse_loose("cookbook"), None);
    }

    #[tokio::test]
    async fn test_compose_drops_unknown_genres() {
        let mock = Arc::new(MockProvider::new());
        mock.enqueue(
            AgentRole::StyleArchitect,
            r#"{"genres": ["mystery", "cookbook"], "tone": "Measured, gaslit dread.", "terminology": ["Keep honorifics untranslated"]}"#,
        );

        let architect = StyleArchitect::new(mock);
        let guide = architect.compose("sample").await.unwrap();
        assert_eq!(guide.genres, vec![Genre::Mystery]);
        assert_eq!(guide.terminology.len(), 1);
    }

    #[test]
    fn test_render_includes_directives() {
        let guide = StyleGuide {
            genres: vec![Genre::Fantasy],
            tone: "High register.".to_string(),
            terminology: vec!["Use British spelling".to_string()],
        };
        let rendered = guide.render();
        assert!(rendered.contains("fantasy"));
        assert!(rendered.contains("British spelling"));
    }
}
