//! Scraper collaborators that pull raw feedback for a product.

mod google_search;
mod reddit;
mod reddit_helpers;
mod youtube;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use insight_core::{AppConfig, FeedbackSource, ProductConfig};

use crate::error::PipelineError;
use crate::types::RawFeedback;

pub use google_search::GoogleSearchCollector;
pub use reddit::{RedditCollector, RedditCredentials};
pub use youtube::YouTubeCollector;

/// Default per-subreddit post limit when a product sets no `max_posts`.
pub const DEFAULT_MAX_POSTS: usize = 50;
/// Default number of videos searched when a product sets no `max_videos`.
pub const DEFAULT_MAX_VIDEOS: usize = 10;
/// Default number of search results when a product sets no `max_results`.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// One external platform that yields raw feedback records.
#[async_trait]
pub trait FeedbackCollector: Send + Sync {
    fn source(&self) -> FeedbackSource;

    /// Fetch every record this source has for `product`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Source`] when the platform cannot be queried
    /// at all. Individual unusable records are dropped, not reported.
    async fn collect(&self, product: &ProductConfig) -> Result<Vec<RawFeedback>, PipelineError>;
}

/// The sources one ingestion run will use for a product.
#[derive(Clone, Default)]
pub struct SourcePlan {
    /// Sources the product asks for that have credentials configured.
    pub collectors: Vec<Arc<dyn FeedbackCollector>>,
    /// Sources the product asks for whose credentials are missing.
    pub unavailable: Vec<FeedbackSource>,
}

impl SourcePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl From<Vec<Arc<dyn FeedbackCollector>>> for SourcePlan {
    fn from(collectors: Vec<Arc<dyn FeedbackCollector>>) -> Self {
        Self {
            collectors,
            unavailable: Vec::new(),
        }
    }
}

/// Plan the sources for `product` from the catalog entry and credentials.
///
/// A source the product asks for but that lacks credentials is logged and
/// listed in [`SourcePlan::unavailable`]; the ingestion run reports it as
/// yielding nothing.
#[must_use]
pub fn collectors_for(config: &AppConfig, product: &ProductConfig) -> SourcePlan {
    let timeout = Duration::from_secs(config.http_timeout_secs);
    let mut collectors: Vec<Arc<dyn FeedbackCollector>> = Vec::new();
    let mut unavailable = Vec::new();

    if !product.youtube_keywords.is_empty() {
        match &config.youtube_api_key {
            Some(key) => collectors.push(Arc::new(YouTubeCollector::new(key.clone(), timeout))),
            None => unavailable.push(skip(product, FeedbackSource::YoutubeComment, "YOUTUBE_API_KEY")),
        }
    }

    if !product.reddit_subreddits.is_empty() {
        match (&config.reddit_client_id, &config.reddit_client_secret) {
            (Some(id), Some(secret)) => {
                let credentials = RedditCredentials {
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                    user_agent: config.reddit_user_agent.clone(),
                };
                collectors.push(Arc::new(RedditCollector::new(credentials, timeout)));
            }
            _ => unavailable.push(skip(
                product,
                FeedbackSource::RedditPost,
                "REDDIT_CLIENT_ID/REDDIT_CLIENT_SECRET",
            )),
        }
    }

    if product.google_search {
        match &config.serpapi_api_key {
            Some(key) => collectors.push(Arc::new(GoogleSearchCollector::new(key.clone(), timeout))),
            None => unavailable.push(skip(product, FeedbackSource::GoogleSearch, "SERPAPI_API_KEY")),
        }
    }

    SourcePlan {
        collectors,
        unavailable,
    }
}

fn skip(product: &ProductConfig, source: FeedbackSource, missing: &str) -> FeedbackSource {
    tracing::warn!(
        product_id = product.id,
        source = %source,
        missing,
        "source credentials not configured, skipping"
    );
    source
}

/// Build a reqwest client with the shared request timeout.
fn http_client(source: FeedbackSource, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(source = %source, error = %e, "HTTP client build failed, using defaults");
            reqwest::Client::new()
        })
}
