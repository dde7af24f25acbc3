//! Text-to-vector collaborators.
//!
//! The production [`TeiEmbedder`] talks to a TEI (Text Embeddings Inference)
//! server. Everything downstream only sees the [`Embedder`] trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PipelineError;

/// Maximum number of texts per /embed call.
const BATCH_SIZE: usize = 64;

/// Probe text embedded once at connect time to learn the model's dimension.
const DIMENSION_PROBE: &str = "dimension probe";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmbeddingUnavailable`] when any input is empty
    /// or the backend cannot produce vectors.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Same as [`Embedder::embed`].
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        self.embed(&[text]).await?.pop().ok_or_else(|| {
            PipelineError::EmbeddingUnavailable("embedder returned no vector".to_string())
        })
    }
}

/// TEI HTTP client.
#[derive(Debug, Clone)]
pub struct TeiEmbedder {
    client: reqwest::Client,
    url: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
    truncate: bool,
}

impl TeiEmbedder {
    /// Connect to a TEI server and probe its embedding dimension.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if the HTTP client cannot be
    /// built or the probe fails; without a dimension no store can be opened.
    pub async fn connect(tei_url: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("TEI client build failed: {e}")))?;
        let mut embedder = Self {
            client,
            url: format!("{}/embed", tei_url.trim_end_matches('/')),
            dimension: 0,
        };

        let probe = embedder
            .request(&[DIMENSION_PROBE])
            .await
            .map_err(|e| PipelineError::Configuration(format!("TEI dimension probe: {e}")))?;
        let dimension = probe.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(PipelineError::Configuration(
                "TEI dimension probe returned an empty vector".to_string(),
            ));
        }
        embedder.dimension = dimension;
        tracing::info!(url = %embedder.url, dimension, "connected to TEI");
        Ok(embedder)
    }

    /// Build a client with a known dimension, skipping the probe.
    #[must_use]
    pub fn with_dimension(tei_url: &str, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/embed", tei_url.trim_end_matches('/')),
            dimension,
        }
    }

    async fn request(&self, chunk: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let request = EmbedRequest {
            inputs: chunk,
            truncate: true,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                PipelineError::EmbeddingUnavailable(format!("TEI request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(PipelineError::EmbeddingUnavailable(format!(
                "TEI returned status {}",
                response.status()
            )));
        }

        let embeddings: Vec<Vec<f32>> = response.json().await.map_err(|e| {
            PipelineError::EmbeddingUnavailable(format!("TEI response parse error: {e}"))
        })?;

        if embeddings.len() != chunk.len() {
            return Err(PipelineError::EmbeddingUnavailable(format!(
                "TEI returned {} embeddings for {} inputs",
                embeddings.len(),
                chunk.len()
            )));
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for TeiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    /// Texts are sent in groups of [`BATCH_SIZE`] per request.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(PipelineError::EmbeddingUnavailable(format!(
                "input {pos} is empty"
            )));
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            let embeddings = self.request(chunk).await?;
            if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dimension) {
                return Err(PipelineError::DimensionMismatch {
                    expected: self.dimension,
                    got: bad.len(),
                });
            }
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }
}

#[cfg(test)]
#[path = "embeddings_test.rs"]
mod tests;
