//! Error types for the `local-rag` crate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The step of an [`answer`](crate::RagPipeline::answer) call that was running
/// when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStage {
    /// Embedding the query and searching the document store.
    Retrieving,
    /// Selecting and ordering passages into a context block.
    Assembling,
    /// Waiting on the generation backend.
    Generating,
}

impl fmt::Display for AnswerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retrieving => "retrieving",
            Self::Assembling => "assembling",
            Self::Generating => "generating",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed caller input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The embedding provider failed, or returned vectors that do not fit the collection.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend could not be reached.
    #[error("Generation backend unavailable ({backend}): {message}")]
    BackendUnavailable {
        /// The generation backend that was called.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A generation request exceeded its wall-clock ceiling.
    #[error("Generation backend timed out ({backend}) after {timeout:?}")]
    Timeout {
        /// The generation backend that was called.
        backend: String,
        /// The ceiling that was exceeded.
        timeout: Duration,
    },

    /// The generation backend answered, but with a failure.
    #[error("Generation error ({backend}): {message}")]
    Generation {
        /// The generation backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A failed [`answer`](crate::RagPipeline::answer) call, tagged with the
    /// originating query and the stage that failed.
    #[error("answer failed while {stage} (query: {query:?}): {source}")]
    Answer {
        /// The query that was being answered.
        query: String,
        /// The stage that failed.
        stage: AnswerStage,
        /// The underlying failure.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    /// Whether the failure is a transient connectivity problem worth one retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::BackendUnavailable { .. } | Self::Timeout { .. } => true,
            Self::Answer { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// The stage of an `answer()` call that failed, if this error came from one.
    pub fn stage(&self) -> Option<AnswerStage> {
        match self {
            Self::Answer { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error, unwrapping any [`RagError::Answer`] context.
    pub fn root_cause(&self) -> &RagError {
        match self {
            Self::Answer { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_wrapper_keeps_stage_and_root_cause() {
        let err = RagError::Answer {
            query: "what?".to_string(),
            stage: AnswerStage::Generating,
            source: Box::new(RagError::Timeout {
                backend: "mock".to_string(),
                timeout: Duration::from_secs(1),
            }),
        };

        assert_eq!(err.stage(), Some(AnswerStage::Generating));
        assert!(err.is_transient());
        assert!(matches!(err.root_cause(), RagError::Timeout { .. }));
        assert!(err.to_string().contains("while generating"));
        assert!(err.to_string().contains("what?"));
    }

    #[test]
    fn only_connectivity_failures_are_transient() {
        let unavailable =
            RagError::BackendUnavailable { backend: "b".into(), message: "refused".into() };
        let semantic = RagError::Generation { backend: "b".into(), message: "bad model".into() };

        assert!(unavailable.is_transient());
        assert!(!semantic.is_transient());
        assert!(!RagError::Validation("empty".into()).is_transient());
    }
}
