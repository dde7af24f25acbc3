//! One ingestion run for one product scope.
//!
//! 1. Collect raw records from every configured source (sequentially).
//! 2. Normalize content; drop records with no stable id or empty content.
//! 3. Collapse duplicate deterministic ids (last occurrence wins).
//! 4. Embed, annotate sentiment, assemble payloads.
//! 5. Upsert in fixed-size batches, each retried wholesale on transient
//!    store failures.
//!
//! Per-item problems (malformed dates, embedding failures) are logged and the
//! run carries on. Store failures end the run with an error; batches that
//! were already committed stay committed.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use insight_core::{FeedbackSource, ProductConfig};
use serde::Serialize;
use uuid::Uuid;

use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::identity::point_id;
use crate::normalize::normalize;
use crate::retry::retry_with_backoff;
use crate::sentiment::SentimentAnalyzer;
use crate::sources::SourcePlan;
use crate::types::{FeedbackItem, FeedbackPayload, IndexedPoint, RawFeedback};
use crate::vector_store::{check_vector, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Points per upsert call.
    pub batch_size: usize,
    /// Extra attempts for a batch that hit a transient store failure.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub product_id: i64,
    /// Raw records returned by all sources together.
    pub items_found: usize,
    pub items_stored: usize,
    /// Records dropped: no id, empty content, duplicate id or failed embedding.
    pub items_skipped: usize,
    pub batches_committed: usize,
    /// Sources that yielded nothing, including ones that failed.
    pub empty_sources: Vec<FeedbackSource>,
    pub failed_sources: Vec<FeedbackSource>,
}

/// Drives ingestion into a vector store. Cheap to clone.
#[derive(Clone)]
pub struct IngestionCoordinator {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    analyzer: Arc<SentimentAnalyzer>,
    settings: IngestSettings,
}

impl IngestionCoordinator {
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        analyzer: Arc<SentimentAnalyzer>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            analyzer,
            settings: IngestSettings {
                batch_size: settings.batch_size.max(1),
                ..settings
            },
        }
    }

    /// Collect from every source and ingest the result for `product`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::StoreUnavailable`] if a batch could not be committed
    ///   after retries
    /// - configuration-class errors (e.g. [`PipelineError::DimensionMismatch`])
    ///   from the embedder or store
    pub async fn run(
        &self,
        product: &ProductConfig,
        sources: &SourcePlan,
    ) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport {
            product_id: product.id,
            ..IngestReport::default()
        };
        let mut raw = Vec::new();

        for collector in &sources.collectors {
            let source = collector.source();
            match collector.collect(product).await {
                Ok(items) => {
                    tracing::info!(
                        product_id = product.id,
                        source = %source,
                        count = items.len(),
                        "source collected"
                    );
                    if items.is_empty() {
                        report.empty_sources.push(source);
                    }
                    raw.extend(items);
                }
                Err(e) => {
                    tracing::warn!(
                        product_id = product.id,
                        source = %source,
                        error = %e,
                        "source failed, continuing with remaining sources"
                    );
                    report.failed_sources.push(source);
                    report.empty_sources.push(source);
                }
            }
        }

        report.empty_sources.extend(&sources.unavailable);

        self.ingest_into(&mut report, raw).await?;

        tracing::info!(
            product_id = product.id,
            found = report.items_found,
            stored = report.items_stored,
            skipped = report.items_skipped,
            batches = report.batches_committed,
            "ingestion run complete"
        );
        Ok(report)
    }

    /// Ingest already-collected records for `product_id`.
    ///
    /// # Errors
    ///
    /// Same as [`IngestionCoordinator::run`].
    pub async fn ingest(
        &self,
        product_id: i64,
        raw: Vec<RawFeedback>,
    ) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport {
            product_id,
            ..IngestReport::default()
        };
        self.ingest_into(&mut report, raw).await?;
        Ok(report)
    }

    async fn ingest_into(
        &self,
        report: &mut IngestReport,
        raw: Vec<RawFeedback>,
    ) -> Result<(), PipelineError> {
        report.items_found += raw.len();
        let prepared: Vec<FeedbackItem> = raw
            .into_iter()
            .filter_map(|item| prepare_item(report.product_id, item))
            .collect();
        let usable = prepared.len();
        let items = dedupe(prepared);
        if items.len() < usable {
            tracing::debug!(
                product_id = report.product_id,
                duplicates = usable - items.len(),
                "collapsed duplicate feedback ids"
            );
        }
        report.items_skipped += report.items_found - items.len();

        let batch_size = self.settings.batch_size;
        let mut ready: Vec<IndexedPoint> = Vec::with_capacity(batch_size);
        for chunk in items.chunks(batch_size) {
            let points = self.embed_chunk(chunk).await?;
            report.items_skipped += chunk.len() - points.len();
            ready.extend(points);

            while ready.len() >= batch_size {
                let batch: Vec<IndexedPoint> = ready.drain(..batch_size).collect();
                self.flush(report, batch).await?;
            }
        }
        if !ready.is_empty() {
            self.flush(report, ready).await?;
        }
        Ok(())
    }

    /// Embed one chunk, falling back to item-by-item when the batch call fails
    /// so a single bad text does not sink its neighbours.
    async fn embed_chunk(&self, chunk: &[FeedbackItem]) -> Result<Vec<IndexedPoint>, PipelineError> {
        let texts: Vec<&str> = chunk.iter().map(|item| item.content.as_str()).collect();
        match self.embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == chunk.len() => {
                let mut points = Vec::with_capacity(chunk.len());
                for (item, vector) in chunk.iter().zip(vectors) {
                    points.extend(self.to_point(item, vector)?);
                }
                Ok(points)
            }
            Ok(vectors) => {
                tracing::warn!(
                    expected = chunk.len(),
                    got = vectors.len(),
                    "embedder returned the wrong number of vectors, retrying item by item"
                );
                self.embed_each(chunk).await
            }
            Err(e) if e.is_configuration() => Err(e),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    items = chunk.len(),
                    "batch embedding failed, retrying item by item"
                );
                self.embed_each(chunk).await
            }
        }
    }

    async fn embed_each(&self, chunk: &[FeedbackItem]) -> Result<Vec<IndexedPoint>, PipelineError> {
        let mut points = Vec::with_capacity(chunk.len());
        for item in chunk {
            match self.embedder.embed_one(&item.content).await {
                Ok(vector) => points.extend(self.to_point(item, vector)?),
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        product_id = item.product_id,
                        source = %item.source,
                        external_id = item.source_local_id.as_str(),
                        error = %e,
                        "embedding failed, skipping item"
                    );
                }
            }
        }
        Ok(points)
    }

    /// Assemble the point for `item`, or `None` when its vector is unusable
    /// (empty, non-finite, zero norm). A wrong dimension is fatal.
    fn to_point(
        &self,
        item: &FeedbackItem,
        embedding: Vec<f32>,
    ) -> Result<Option<IndexedPoint>, PipelineError> {
        match check_vector(&embedding, self.store.dimension()) {
            Ok(()) => {}
            Err(e) if e.is_configuration() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    product_id = item.product_id,
                    source = %item.source,
                    external_id = item.source_local_id.as_str(),
                    error = %e,
                    "unusable embedding, skipping item"
                );
                return Ok(None);
            }
        }

        let sentiment = self.analyzer.analyze(&item.content);
        Ok(Some(IndexedPoint {
            point_id: item_point_id(item),
            embedding,
            payload: FeedbackPayload {
                product_id: item.product_id,
                source: item.source,
                external_id: item.source_local_id.clone(),
                content: item.content.clone(),
                created_at: item.created_at,
                sentiment_label: sentiment.label,
                sentiment_compound: sentiment.compound,
                rating: item.rating,
            },
        }))
    }

    async fn flush(
        &self,
        report: &mut IngestReport,
        batch: Vec<IndexedPoint>,
    ) -> Result<(), PipelineError> {
        let size = batch.len();
        let batch_no = report.batches_committed + 1;
        let result = retry_with_backoff(
            self.settings.max_retries,
            self.settings.retry_backoff_ms,
            || {
                let store = Arc::clone(&self.store);
                let points = batch.clone();
                async move { store.upsert_many(points).await }
            },
        )
        .await;

        if let Err(e) = result {
            tracing::error!(
                product_id = report.product_id,
                batch = batch_no,
                size,
                committed = report.items_stored,
                error = %e,
                "batch upsert failed, aborting run"
            );
            return Err(e);
        }

        report.batches_committed += 1;
        report.items_stored += size;
        tracing::debug!(
            product_id = report.product_id,
            batch = batch_no,
            size,
            "batch committed"
        );
        Ok(())
    }
}

fn item_point_id(item: &FeedbackItem) -> Uuid {
    point_id(item.source.as_str(), &item.source_local_id)
}

/// Clean one raw record. `None` when it has no stable id or no content left.
fn prepare_item(product_id: i64, raw: RawFeedback) -> Option<FeedbackItem> {
    let Some(source_local_id) = raw
        .source_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        tracing::debug!(product_id, source = %raw.source, "record without id, skipping");
        return None;
    };

    let content = normalize(raw.content.as_deref());
    if content.is_empty() {
        tracing::debug!(
            product_id,
            source = %raw.source,
            external_id = source_local_id.as_str(),
            "record with empty content, skipping"
        );
        return None;
    }

    let created_at = raw.created_at.as_deref().and_then(|value| {
        parse_created_at(value)
            .inspect_err(|e| {
                tracing::warn!(
                    product_id,
                    source = %raw.source,
                    external_id = source_local_id.as_str(),
                    value,
                    error = %e,
                    "malformed created_at, storing without timestamp"
                );
            })
            .ok()
    });

    Some(FeedbackItem {
        source: raw.source,
        source_local_id,
        content,
        created_at,
        product_id,
        rating: raw.rating,
    })
}

/// Keep the last occurrence of every deterministic id, in first-seen order.
fn dedupe(items: Vec<FeedbackItem>) -> Vec<FeedbackItem> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut kept: Vec<FeedbackItem> = items
        .into_iter()
        .rev()
        .filter(|item| seen.insert(item_point_id(item)))
        .collect();
    kept.reverse();
    kept
}

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one taken as UTC.
pub(crate) fn parse_created_at(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .or_else(|_| {
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
            })
            .map_err(|_| rfc_err),
    }
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
