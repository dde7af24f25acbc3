//! Records that flow between scrapers, the store, and the insight engine.

use chrono::{DateTime, Utc};
use insight_core::FeedbackSource;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sentiment::SentimentLabel;

/// One record as handed over by a scraper, before any cleaning.
///
/// Every field except `source` may be absent; the ingestion coordinator
/// decides what is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeedback {
    pub source: FeedbackSource,
    /// Source-local identifier, e.g. `reddit_post_abc123`.
    pub source_id: Option<String>,
    pub content: Option<String>,
    /// Timestamp as the platform reported it (RFC 3339 or naive ISO 8601).
    pub created_at: Option<String>,
    /// Star rating, for sources that carry one.
    pub rating: Option<f32>,
}

/// A cleaned feedback item scoped to a product, ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackItem {
    pub source: FeedbackSource,
    pub source_local_id: String,
    /// Normalized content; never empty.
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub product_id: i64,
    pub rating: Option<f32>,
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub product_id: i64,
    pub source: FeedbackSource,
    pub external_id: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub sentiment_label: SentimentLabel,
    pub sentiment_compound: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

/// One `(id, vector, payload)` record in the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    pub point_id: Uuid,
    pub embedding: Vec<f32>,
    pub payload: FeedbackPayload,
}

/// A search hit, nearest-first ordering is the caller's contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub point_id: Uuid,
    /// Cosine similarity; higher is nearer.
    pub score: f32,
    pub payload: FeedbackPayload,
}

/// Predicate applied to point payloads during search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub product_id: Option<i64>,
}

impl SearchFilter {
    /// Restrict results to a single product scope.
    #[must_use]
    pub fn product(product_id: i64) -> Self {
        Self {
            product_id: Some(product_id),
        }
    }

    #[must_use]
    pub fn matches(&self, payload: &FeedbackPayload) -> bool {
        self.product_id.is_none_or(|id| payload.product_id == id)
    }
}

/// The product a question is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub id: i64,
    pub name: String,
}

impl From<&insight_core::ProductConfig> for ProductRef {
    fn from(product: &insight_core::ProductConfig) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
        }
    }
}
