use insight_core::FeedbackSource;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credentials or an unusable setting. Fatal at startup, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A vector does not match the dimension the store was created with.
    #[error("embedding dimension mismatch: store expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("synthesis failed: {0}")]
    SynthesisFailure(String),

    #[error("{kind} source failed: {message}")]
    Source {
        kind: FeedbackSource,
        message: String,
    },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// `true` for configuration-class failures that should stop the process.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_) | PipelineError::DimensionMismatch { .. }
        )
    }

    /// `true` for failures worth retrying a whole store batch for.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, PipelineError::StoreUnavailable(_))
    }

    pub(crate) fn source_failed(kind: FeedbackSource, message: impl Into<String>) -> Self {
        PipelineError::Source {
            kind,
            message: message.into(),
        }
    }
}
