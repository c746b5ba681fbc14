//! Error types for the translation engine.
//!
//! Uses thiserror for ergonomic error definition. The split mirrors the
//! failure taxonomy: provider errors (transient vs. permanent) come from the
//! `llm` crate, graph errors guard referential integrity, and orchestration
//! errors distinguish a failed chapter from a fatally misconfigured document.

use crate::id::EntityId;
use llm::LlmError;

/// Main error type for the translation engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Knowledge graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Entity resolution error
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Extraction error
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Orchestration error
    #[error("Orchestration error: {0}")]
    Orchestrate(#[from] OrchestrateError),

    /// Document pipeline error
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Knowledge graph errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Entity lookup failed
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A triplet referenced an entity that has not been committed.
    /// Entities must commit before any triplet referencing them.
    #[error("Triplet references uncommitted entity: {0}")]
    UncommittedReference(EntityId),

    /// A validity interval with end <= start
    #[error("Invalid validity interval [{start}, {end})")]
    InvalidValidity {
        /// Interval start
        start: f64,
        /// Interval end
        end: f64,
    },

    /// Backend storage failure
    #[error("Store error: {0}")]
    Store(String),
}

/// Entity resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Graph operation failed during resolution
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// A rename referenced an entity the resolver has never seen
    #[error("Rename target unknown: {name} (chapter {chapter})")]
    UnknownRenameTarget {
        /// Name the rename pointed at
        name: String,
        /// Chapter the rename occurred in
        chapter: u32,
    },
}

/// Extraction errors
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Provider call failed
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    /// The provider answered, but not with a parseable payload
    #[error("Unparseable extraction payload: {0}")]
    Payload(String),
}

/// Orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum OrchestrateError {
    /// Language or style guide still missing after the setup stage.
    /// Fatal for the document; the diagnostic names the missing field.
    #[error("Setup incomplete: {field} still missing after setup stage")]
    SetupIncomplete {
        /// Which prerequisite is missing
        field: &'static str,
    },

    /// Provider call failed beyond its bounded retry policy
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    /// Graph operation failed mid-chapter
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Document pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Orchestration failed in a way that is fatal for the document
    #[error("Orchestration error: {0}")]
    Orchestrate(#[from] OrchestrateError),

    /// Resolution failed
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Graph operation failed
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// A chapter task panicked or was aborted
    #[error("Chapter task failed: {0}")]
    Join(String),

    /// The document contained no chapters
    #[error("Document has no chapters")]
    EmptyDocument,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for graph operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Result type for resolution operations
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Result type for extraction operations
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result type for orchestration operations
pub type OrchestrateResult<T> = std::result::Result<T, OrchestrateError>;

/// Result type for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestrateError::SetupIncomplete { field: "language" };
        assert_eq!(
            err.to_string(),
            "Setup incomplete: language still missing after setup stage"
        );
    }

    #[test]
    fn test_error_conversion() {
        let graph_err = GraphError::EntityNotFound(EntityId::nil());
        let err: Error = graph_err.into();
        assert!(matches!(err, Error::Graph(_)));
    }
}
