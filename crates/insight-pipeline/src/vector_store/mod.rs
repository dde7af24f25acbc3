//! Point storage with scoped nearest-neighbour search.
//!
//! Two backends implement [`VectorStore`]: [`FlatFileStore`], an in-process
//! flat index persisted to a directory, and [`QdrantStore`], a managed
//! collection with native payload filtering. Callers never see which one is
//! in use.

mod flat;
mod flat_file;
mod qdrant;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::types::{IndexedPoint, ScoredPoint, SearchFilter};

pub use flat::FlatFileStore;
pub use qdrant::QdrantStore;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embedding dimension fixed when the store was opened.
    fn dimension(&self) -> usize;

    /// Insert or overwrite a single point.
    ///
    /// # Errors
    ///
    /// See [`VectorStore::upsert_many`].
    async fn upsert_one(&self, point: IndexedPoint) -> Result<(), PipelineError> {
        self.upsert_many(vec![point]).await
    }

    /// Insert or overwrite a batch of points. A batch lands completely or not
    /// at all; earlier batches are never affected by a later failure.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::EmbeddingUnavailable`] for an empty or non-finite vector
    /// - [`PipelineError::DimensionMismatch`] for a vector of the wrong length
    /// - [`PipelineError::StoreUnavailable`] when the batch could not be committed
    async fn upsert_many(&self, points: Vec<IndexedPoint>) -> Result<(), PipelineError>;

    /// Up to `k` points nearest to `query`, nearest first, restricted to
    /// `filter` when given. An empty store yields an empty result.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::DimensionMismatch`] for a query of the wrong length
    /// - [`PipelineError::StoreUnavailable`] when the backend cannot be reached
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, PipelineError>;

    /// Number of stored points.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StoreUnavailable`] when the backend cannot be reached.
    async fn count(&self) -> Result<usize, PipelineError>;
}

/// Reject vectors that must never be stored or searched with.
pub(crate) fn check_vector(vector: &[f32], dimension: usize) -> Result<(), PipelineError> {
    if vector.is_empty() {
        return Err(PipelineError::EmbeddingUnavailable(
            "empty embedding vector".to_string(),
        ));
    }
    if vector.len() != dimension {
        return Err(PipelineError::DimensionMismatch {
            expected: dimension,
            got: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::EmbeddingUnavailable(
            "embedding contains non-finite values".to_string(),
        ));
    }
    if l2_norm(vector) < f32::EPSILON {
        return Err(PipelineError::EmbeddingUnavailable(
            "embedding has zero norm".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length so inner product equals cosine similarity.
pub(crate) fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    v.iter().map(|x| x / norm).collect()
}
