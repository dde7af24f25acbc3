//! Qdrant REST backend with native payload filtering.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{check_vector, VectorStore};
use crate::error::PipelineError;
use crate::types::{FeedbackPayload, IndexedPoint, ScoredPoint, SearchFilter};

/// Qdrant HTTP client bound to one collection.
#[derive(Clone)]
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dimension: usize,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("collection", &self.collection)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorsConfig,
}

#[derive(Serialize, Deserialize)]
struct VectorsConfig {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct UpsertPointsRequest<'a> {
    points: Vec<Point<'a>>,
}

#[derive(Serialize)]
struct Point<'a> {
    id: Uuid,
    vector: &'a [f32],
    payload: &'a FeedbackPayload,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorsConfig,
}

#[derive(Deserialize)]
struct SearchHit {
    id: Uuid,
    score: f32,
    payload: Option<FeedbackPayload>,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantStore {
    /// Connect and make sure the collection exists with the right dimension.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::DimensionMismatch`] if the collection exists with a
    ///   different vector size
    /// - [`PipelineError::StoreUnavailable`] on network or API failure
    pub async fn connect(
        qdrant_url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("Qdrant client build failed: {e}")))?;
        let store = Self {
            client,
            base_url: qdrant_url.trim_end_matches('/').to_string(),
            api_key,
            collection: collection.to_string(),
            dimension,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, PipelineError> {
        let resp = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| PipelineError::StoreUnavailable(format!("{what} request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(PipelineError::StoreUnavailable(format!(
                "{what} returned status {}",
                resp.status()
            )));
        }
        Ok(resp)
    }

    /// Ensure the collection exists, creating it if absent.
    ///
    /// New collections use cosine distance and get payload indexes on
    /// `product_id` (integer) and `source` (keyword).
    async fn ensure_collection(&self) -> Result<(), PipelineError> {
        let url = self.collection_url();
        let check = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| PipelineError::StoreUnavailable(format!("collection check failed: {e}")))?;

        if check.status().is_success() {
            let info: QdrantResponse<CollectionInfo> = check.json().await.map_err(|e| {
                PipelineError::StoreUnavailable(format!("collection info parse error: {e}"))
            })?;
            let size = info.result.config.params.vectors.size;
            if size != self.dimension {
                return Err(PipelineError::DimensionMismatch {
                    expected: self.dimension,
                    got: size,
                });
            }
            tracing::debug!(collection = %self.collection, size, "Qdrant collection exists");
            return Ok(());
        }
        if check.status() != StatusCode::NOT_FOUND {
            return Err(PipelineError::StoreUnavailable(format!(
                "collection check returned status {}",
                check.status()
            )));
        }

        let body = CreateCollectionRequest {
            vectors: VectorsConfig {
                size: self.dimension,
                distance: "Cosine".to_string(),
            },
        };
        self.send(self.client.put(&url).json(&body), "collection create")
            .await?;

        for (field, schema) in [("product_id", "integer"), ("source", "keyword")] {
            let index_url = format!("{url}/index?wait=true");
            let body = json!({ "field_name": field, "field_schema": schema });
            self.send(self.client.put(&index_url).json(&body), "payload index create")
                .await?;
        }

        tracing::info!(
            collection = %self.collection,
            dimension = self.dimension,
            "created Qdrant collection"
        );
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert_many(&self, points: Vec<IndexedPoint>) -> Result<(), PipelineError> {
        for point in &points {
            check_vector(&point.embedding, self.dimension)?;
        }
        if points.is_empty() {
            return Ok(());
        }

        let body = UpsertPointsRequest {
            points: points
                .iter()
                .map(|p| Point {
                    id: p.point_id,
                    vector: &p.embedding,
                    payload: &p.payload,
                })
                .collect(),
        };
        let url = format!("{}/points?wait=true", self.collection_url());
        self.send(self.client.put(&url).json(&body), "upsert").await?;
        tracing::debug!(batch = points.len(), collection = %self.collection, "Qdrant batch committed");
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, PipelineError> {
        if query.len() != self.dimension {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut body = json!({
            "vector": query,
            "limit": k,
            "with_payload": true,
        });
        if let Some(product_id) = filter.and_then(|f| f.product_id) {
            body["filter"] = json!({
                "must": [{ "key": "product_id", "match": { "value": product_id } }]
            });
        }

        let url = format!("{}/points/search", self.collection_url());
        let resp = self.send(self.client.post(&url).json(&body), "search").await?;
        let hits: QdrantResponse<Vec<SearchHit>> = resp
            .json()
            .await
            .map_err(|e| PipelineError::StoreUnavailable(format!("search parse error: {e}")))?;

        let mut results = Vec::with_capacity(hits.result.len());
        for hit in hits.result {
            let Some(payload) = hit.payload else {
                tracing::warn!(point_id = %hit.id, "Qdrant hit without payload, skipping");
                continue;
            };
            // Pushdown already scoped the hits; this only guards against a misconfigured index.
            if filter.is_some_and(|f| !f.matches(&payload)) {
                continue;
            }
            results.push(ScoredPoint {
                point_id: hit.id,
                score: hit.score,
                payload,
            });
        }
        Ok(results)
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        let url = format!("{}/points/count", self.collection_url());
        let resp = self
            .send(self.client.post(&url).json(&json!({ "exact": true })), "count")
            .await?;
        let count: QdrantResponse<CountResult> = resp
            .json()
            .await
            .map_err(|e| PipelineError::StoreUnavailable(format!("count parse error: {e}")))?;
        Ok(count.result.count)
    }
}

#[cfg(test)]
#[path = "qdrant_test.rs"]
mod tests;
