//! Feedback retrieval and insight synthesis.
//!
//! Scrapers feed raw product feedback into the [`IngestionCoordinator`],
//! which normalizes, deduplicates by deterministic point id, annotates
//! sentiment, embeds, and upserts it into a [`VectorStore`] in fixed-size
//! batches. The [`InsightEngine`] answers questions scoped to one product by
//! retrieving nearest feedback, building a bounded context, and streaming a
//! synthesized answer back fragment by fragment.

pub mod embeddings;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod normalize;
pub mod sentiment;
pub mod services;
pub mod sources;
pub mod synthesis;
pub mod types;
pub mod vector_store;

mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use embeddings::{Embedder, TeiEmbedder};
pub use engine::{AnswerPhase, EngineSettings, InsightEngine, NO_RESULTS_MESSAGE};
pub use error::PipelineError;
pub use identity::point_id;
pub use ingest::{IngestReport, IngestSettings, IngestionCoordinator};
pub use normalize::normalize;
pub use sentiment::{SentimentAnalyzer, SentimentLabel, SentimentScore};
pub use services::Services;
pub use sources::{collectors_for, FeedbackCollector, SourcePlan};
pub use synthesis::{
    ChatCompletionsClient, ChatMessage, FragmentStream, Role, SynthesisRequest, SynthesisStream,
    Synthesizer,
};
pub use types::{
    FeedbackItem, FeedbackPayload, IndexedPoint, ProductRef, RawFeedback, ScoredPoint,
    SearchFilter,
};
pub use vector_store::{FlatFileStore, QdrantStore, VectorStore};
