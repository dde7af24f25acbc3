//! Question answering over scoped feedback, streamed as text fragments.
//!
//! Per call the engine walks
//! `EmbeddingQuery → Searching → (NoResults | BuildingContext) → Synthesizing → Streaming → Done`,
//! with `Failed` reachable from every non-terminal phase. Failures never
//! escape the fragment stream: they end it with a readable message instead.

mod context;
mod prompt;

use std::sync::Arc;

use futures::StreamExt;

use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::sentiment::SentimentAnalyzer;
use crate::synthesis::{ChatMessage, FragmentStream, SynthesisRequest, SynthesisStream, Synthesizer};
use crate::types::{ProductRef, SearchFilter};
use crate::vector_store::VectorStore;

pub use context::{ContextEntry, RetrievalContext};

/// Emitted alone when nothing scoped to the product matches the question.
pub const NO_RESULTS_MESSAGE: &str =
    "No relevant feedback was found for this product. Try ingesting feedback first or rephrasing the question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPhase {
    EmbeddingQuery,
    Searching,
    NoResults,
    BuildingContext,
    Synthesizing,
    Streaming,
    Done,
    Failed,
}

impl std::fmt::Display for AnswerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnswerPhase::EmbeddingQuery => "embedding_query",
            AnswerPhase::Searching => "searching",
            AnswerPhase::NoResults => "no_results",
            AnswerPhase::BuildingContext => "building_context",
            AnswerPhase::Synthesizing => "synthesizing",
            AnswerPhase::Streaming => "streaming",
            AnswerPhase::Done => "done",
            AnswerPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Neighbours retrieved per question.
    pub top_k: usize,
    /// Character budget for the context lines together with their statistics
    /// block. The fixed prompt text around them is not counted.
    pub max_context_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            top_k: 50,
            max_context_chars: 24_000,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// Answers questions and builds reports. Cheap to clone.
#[derive(Clone)]
pub struct InsightEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    analyzer: Arc<SentimentAnalyzer>,
    synthesizer: Arc<dyn Synthesizer>,
    settings: EngineSettings,
}

/// Outcome of the phases before streaming starts.
enum Prepared {
    NoResults,
    Ready(SynthesisStream),
}

fn enter(product_id: i64, phase: AnswerPhase) {
    tracing::debug!(product_id, phase = %phase, "insight engine phase");
}

impl InsightEngine {
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        analyzer: Arc<SentimentAnalyzer>,
        synthesizer: Arc<dyn Synthesizer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            analyzer,
            synthesizer,
            settings: EngineSettings {
                top_k: settings.top_k.max(1),
                ..settings
            },
        }
    }

    /// Answer `question` for `product` as a lazy fragment stream.
    ///
    /// Nothing runs until the stream is polled. Dropping the stream early
    /// abandons the synthesis call and releases its connection.
    #[must_use]
    pub fn answer(&self, question: &str, product: &ProductRef) -> FragmentStream {
        let engine = self.clone();
        let question = question.trim().to_string();
        let product = product.clone();

        Box::pin(async_stream::stream! {
            let mut synthesis = match engine.prepare(&question, &product).await {
                Ok(Prepared::Ready(stream)) => stream,
                Ok(Prepared::NoResults) => {
                    enter(product.id, AnswerPhase::NoResults);
                    yield NO_RESULTS_MESSAGE.to_string();
                    return;
                }
                Err(message) => {
                    enter(product.id, AnswerPhase::Failed);
                    yield message;
                    return;
                }
            };

            enter(product.id, AnswerPhase::Streaming);
            let mut fragments = 0usize;
            while let Some(item) = synthesis.next().await {
                match item {
                    Ok(fragment) => {
                        fragments += 1;
                        yield fragment;
                    }
                    Err(e) => {
                        tracing::warn!(product_id = product.id, fragments, error = %e, "synthesis interrupted");
                        enter(product.id, AnswerPhase::Failed);
                        yield format!("\n\n[analysis interrupted: {e}]");
                        return;
                    }
                }
            }
            enter(product.id, AnswerPhase::Done);
            tracing::debug!(product_id = product.id, fragments, "answer streamed");
        })
    }

    /// Runs every phase up to the opened synthesis stream. `Err` carries the
    /// user-facing failure fragment.
    async fn prepare(&self, question: &str, product: &ProductRef) -> Result<Prepared, String> {
        enter(product.id, AnswerPhase::EmbeddingQuery);
        if question.is_empty() {
            return Err("Unable to process the question: it is empty.".to_string());
        }
        let query = self.embedder.embed_one(question).await.map_err(|e| {
            tracing::warn!(product_id = product.id, error = %e, "question embedding failed");
            format!("Unable to process the question right now ({e}).")
        })?;

        enter(product.id, AnswerPhase::Searching);
        let filter = SearchFilter::product(product.id);
        let hits = self
            .store
            .search(&query, self.settings.top_k, Some(&filter))
            .await
            .map_err(|e| {
                tracing::error!(product_id = product.id, error = %e, "feedback search failed");
                match e {
                    PipelineError::StoreUnavailable(_) => {
                        "The feedback store is currently unavailable. Please try again later."
                            .to_string()
                    }
                    other => format!("Searching feedback failed ({other})."),
                }
            })?;
        if hits.is_empty() {
            return Ok(Prepared::NoResults);
        }

        enter(product.id, AnswerPhase::BuildingContext);
        let retrieved = hits.len();
        let context =
            RetrievalContext::build(hits, &self.analyzer, self.settings.max_context_chars);
        if context.is_empty() {
            tracing::warn!(
                product_id = product.id,
                retrieved,
                budget = self.settings.max_context_chars,
                "no retrieved item fits the context budget"
            );
            return Ok(Prepared::NoResults);
        }
        tracing::debug!(
            product_id = product.id,
            retrieved,
            used = context.entries.len(),
            dropped = context.dropped,
            "context built"
        );

        enter(product.id, AnswerPhase::Synthesizing);
        let request = SynthesisRequest {
            messages: vec![
                ChatMessage::system(prompt::SYSTEM_PROMPT),
                ChatMessage::user(prompt::user_prompt(question, product, &context)),
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let stream = self.synthesizer.stream(request).await.map_err(|e| {
            tracing::error!(product_id = product.id, error = %e, "synthesis call failed");
            format!("The analysis could not be generated ({e}).")
        })?;
        Ok(Prepared::Ready(stream))
    }

    /// Run the fixed report battery for `product`, section by section.
    ///
    /// Each section is an independent [`InsightEngine::answer`] call; a failed
    /// section ends with its failure fragment and the next section still runs.
    #[must_use]
    pub fn generate_report(&self, product: &ProductRef) -> FragmentStream {
        let engine = self.clone();
        let product = product.clone();

        Box::pin(async_stream::stream! {
            for (title, question) in prompt::REPORT_SECTIONS {
                tracing::info!(product_id = product.id, section = title, "report section");
                yield format!("## {title}\n\n");
                let mut section = engine.answer(question, &product);
                while let Some(fragment) = section.next().await {
                    yield fragment;
                }
                yield "\n\n".to_string();
            }
        })
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
