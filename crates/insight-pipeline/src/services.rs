//! Process-scoped collaborators built once from [`AppConfig`] and shared by
//! every ingestion run and question.

use std::sync::Arc;
use std::time::Duration;

use insight_core::{AppConfig, ConfigError, ProductConfig, VectorBackend};

use crate::embeddings::{Embedder, TeiEmbedder};
use crate::engine::{EngineSettings, InsightEngine};
use crate::error::PipelineError;
use crate::ingest::{IngestSettings, IngestionCoordinator};
use crate::sentiment::SentimentAnalyzer;
use crate::sources::{collectors_for, SourcePlan};
use crate::synthesis::{ChatCompletionsClient, Synthesizer};
use crate::vector_store::{FlatFileStore, QdrantStore, VectorStore};

#[derive(Clone)]
pub struct Services {
    config: AppConfig,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    analyzer: Arc<SentimentAnalyzer>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
}

fn missing(var: &str) -> PipelineError {
    PipelineError::Configuration(ConfigError::MissingEnvVar(var.to_string()).to_string())
}

impl Services {
    /// Connect the embedder, open the configured vector store and build the
    /// synthesis client when an LLM key is present.
    ///
    /// # Errors
    ///
    /// Configuration-class [`PipelineError`]s: TEI unreachable at startup,
    /// missing backend settings, or a store whose dimension differs from the
    /// embedder's.
    pub async fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let timeout = Duration::from_secs(config.http_timeout_secs);

        let embedder = TeiEmbedder::connect(&config.tei_url, timeout).await?;
        let dimension = embedder.dimension();
        tracing::info!(tei_url = %config.tei_url, dimension, "embedder ready");

        let store: Arc<dyn VectorStore> = match config.vector_backend {
            VectorBackend::Flat => Arc::new(FlatFileStore::open(config.index_dir.clone(), dimension)?),
            VectorBackend::Qdrant => {
                let url = config.qdrant_url.as_deref().ok_or_else(|| missing("QDRANT_URL"))?;
                Arc::new(
                    QdrantStore::connect(
                        url,
                        config.qdrant_api_key.clone(),
                        &config.qdrant_collection,
                        dimension,
                        timeout,
                    )
                    .await?,
                )
            }
        };
        tracing::info!(backend = %config.vector_backend, "vector store ready");

        let synthesizer: Option<Arc<dyn Synthesizer>> = match &config.llm_api_key {
            Some(key) => Some(Arc::new(ChatCompletionsClient::new(
                &config.llm_base_url,
                key,
                &config.llm_model,
                timeout,
            )?)),
            None => {
                tracing::warn!("INSIGHT_LLM_API_KEY not set, questions and reports are disabled");
                None
            }
        };

        Ok(Self {
            config: config.clone(),
            embedder: Arc::new(embedder),
            store,
            analyzer: SentimentAnalyzer::shared(),
            synthesizer,
        })
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn ingestion(&self) -> IngestionCoordinator {
        IngestionCoordinator::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.store),
            Arc::clone(&self.analyzer),
            IngestSettings {
                batch_size: self.config.ingest_batch_size,
                max_retries: self.config.store_max_retries,
                retry_backoff_ms: self.config.store_retry_backoff_ms,
            },
        )
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when no LLM API key is configured.
    pub fn engine(&self) -> Result<InsightEngine, PipelineError> {
        let synthesizer = self
            .synthesizer
            .as_ref()
            .ok_or_else(|| missing("INSIGHT_LLM_API_KEY"))?;
        Ok(InsightEngine::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.store),
            Arc::clone(&self.analyzer),
            Arc::clone(synthesizer),
            EngineSettings {
                top_k: self.config.search_top_k,
                max_context_chars: self.config.context_max_chars,
                max_tokens: self.config.llm_max_tokens,
                temperature: self.config.llm_temperature,
            },
        ))
    }

    #[must_use]
    pub fn collectors_for(&self, product: &ProductConfig) -> SourcePlan {
        collectors_for(&self.config, product)
    }
}
