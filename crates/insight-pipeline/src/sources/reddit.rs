//! Reddit API feedback collector (client-credentials OAuth).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use insight_core::{FeedbackSource, ProductConfig};
use serde::Deserialize;

use super::reddit_helpers::to_feedback;
use super::{http_client, FeedbackCollector, DEFAULT_MAX_POSTS};
use crate::error::PipelineError;
use crate::types::RawFeedback;

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_URL: &str = "https://oauth.reddit.com";
/// Reddit caps a single listing page at 100 entries.
const PAGE_LIMIT: usize = 100;

#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

/// Reddit OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Reddit search listing wrapper.
#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Post>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Post {
    pub(super) data: PostData,
}

#[derive(Debug, Deserialize)]
pub(super) struct PostData {
    pub(super) id: Option<String>,
    pub(super) title: Option<String>,
    pub(super) selftext: Option<String>,
    pub(super) created_utc: Option<f64>,
}

/// Searches each configured subreddit for the product query, newest first.
pub struct RedditCollector {
    client: reqwest::Client,
    credentials: RedditCredentials,
    auth_url: String,
    api_url: String,
}

impl RedditCollector {
    #[must_use]
    pub fn new(credentials: RedditCredentials, timeout: Duration) -> Self {
        Self {
            // oauth.reddit.com sometimes blocks rustls via TLS fingerprinting.
            // If rejected, enable `native-tls` on reqwest and call `.use_native_tls()`.
            client: http_client(FeedbackSource::RedditPost, timeout),
            credentials,
            auth_url: AUTH_URL.to_string(),
            api_url: API_URL.to_string(),
        }
    }

    /// Point the collector at different endpoints (used against mock servers).
    #[must_use]
    pub fn with_base_urls(mut self, auth_url: &str, api_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_token(&self) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(&self.auth_url)
            .header("User-Agent", &self.credentials.user_agent)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| reddit_error(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(reddit_error(format!(
                "token exchange failed with status {}",
                response.status()
            )));
        }

        let token_resp: TokenResponse = response
            .json()
            .await
            .map_err(|e| reddit_error(format!("token parse error: {e}")))?;

        Ok(token_resp.access_token)
    }

    /// Search one subreddit, following `after` cursors until `limit` posts.
    async fn search_subreddit(
        &self,
        token: &str,
        subreddit: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Post>, PipelineError> {
        let endpoint = format!("{}/r/{subreddit}/search", self.api_url);
        let mut after: Option<String> = None;
        let mut posts = Vec::new();

        while posts.len() < limit {
            let page_size = (limit - posts.len()).min(PAGE_LIMIT);
            let mut params: Vec<(&str, String)> = vec![
                ("q", query.to_string()),
                ("restrict_sr", "true".to_string()),
                ("sort", "new".to_string()),
                ("limit", page_size.to_string()),
                ("type", "link".to_string()),
                ("raw_json", "1".to_string()),
            ];
            if let Some(cursor) = &after {
                params.push(("after", cursor.clone()));
            }

            let response = self
                .client
                .get(&endpoint)
                .header("Authorization", format!("Bearer {token}"))
                .header("User-Agent", &self.credentials.user_agent)
                .query(&params)
                .send()
                .await
                .map_err(|e| reddit_error(format!("search request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(reddit_error(format!(
                    "search in r/{subreddit} failed with status {}",
                    response.status()
                )));
            }

            let listing: Listing = response
                .json()
                .await
                .map_err(|e| reddit_error(format!("Reddit response parse error: {e}")))?;

            let page_len = listing.data.children.len();
            posts.extend(listing.data.children);
            after = listing.data.after;
            if after.is_none() || page_len == 0 {
                break;
            }
        }

        posts.truncate(limit);
        Ok(posts)
    }
}

#[async_trait]
impl FeedbackCollector for RedditCollector {
    fn source(&self) -> FeedbackSource {
        FeedbackSource::RedditPost
    }

    async fn collect(&self, product: &ProductConfig) -> Result<Vec<RawFeedback>, PipelineError> {
        let token = self.fetch_token().await?;
        let query = product.query();
        let limit = product.max_posts.unwrap_or(DEFAULT_MAX_POSTS);

        let mut seen = HashSet::new();
        let mut feedback = Vec::new();
        for subreddit in &product.reddit_subreddits {
            let posts = self.search_subreddit(&token, subreddit, query, limit).await?;
            tracing::debug!(
                product_id = product.id,
                subreddit = subreddit.as_str(),
                count = posts.len(),
                "Reddit search page collected"
            );
            for post in &posts {
                let Some(item) = to_feedback(post) else {
                    continue;
                };
                // The same post can surface in several subreddits' results.
                if item.source_id.as_ref().is_some_and(|id| seen.insert(id.clone())) {
                    feedback.push(item);
                }
            }
        }

        Ok(feedback)
    }
}

fn reddit_error(message: String) -> PipelineError {
    PipelineError::source_failed(FeedbackSource::RedditPost, message)
}
