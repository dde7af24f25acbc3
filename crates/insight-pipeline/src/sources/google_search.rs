//! Google organic search results via SerpApi.

use std::time::Duration;

use async_trait::async_trait;
use insight_core::{FeedbackSource, ProductConfig};
use serde::Deserialize;

use super::{http_client, FeedbackCollector, DEFAULT_MAX_RESULTS};
use crate::error::PipelineError;
use crate::types::RawFeedback;

const API_URL: &str = "https://serpapi.com/search.json";

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
}

pub struct GoogleSearchCollector {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GoogleSearchCollector {
    #[must_use]
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: http_client(FeedbackSource::GoogleSearch, timeout),
            api_key,
            api_url: API_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }
}

/// Search results carry no timestamp; the link is the stable identity.
fn to_feedback(result: OrganicResult) -> Option<RawFeedback> {
    let link = result.link.filter(|l| !l.trim().is_empty())?;
    let content = format!(
        "{}\n{}",
        result.title.unwrap_or_default(),
        result.snippet.unwrap_or_default()
    )
    .trim()
    .to_string();

    Some(RawFeedback {
        source: FeedbackSource::GoogleSearch,
        source_id: Some(link),
        content: (!content.is_empty()).then_some(content),
        created_at: None,
        rating: None,
    })
}

#[async_trait]
impl FeedbackCollector for GoogleSearchCollector {
    fn source(&self) -> FeedbackSource {
        FeedbackSource::GoogleSearch
    }

    async fn collect(&self, product: &ProductConfig) -> Result<Vec<RawFeedback>, PipelineError> {
        let limit = product.max_results.unwrap_or(DEFAULT_MAX_RESULTS).to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("engine", "google"),
                ("q", product.query()),
                ("num", limit.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| search_error(format!("SerpApi request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(search_error(format!(
                "SerpApi returned status {}",
                response.status()
            )));
        }

        let body: SerpResponse = response
            .json()
            .await
            .map_err(|e| search_error(format!("SerpApi response parse error: {e}")))?;
        if let Some(error) = body.error {
            return Err(search_error(format!("SerpApi error: {error}")));
        }

        Ok(body.organic_results.into_iter().filter_map(to_feedback).collect())
    }
}

fn search_error(message: String) -> PipelineError {
    PipelineError::source_failed(FeedbackSource::GoogleSearch, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combines_title_and_snippet() {
        let item = to_feedback(OrganicResult {
            link: Some("https://example.com/review".to_string()),
            title: Some("NS400Z Review".to_string()),
            snippet: Some("Punchy engine, firm ride.".to_string()),
        })
        .expect("feedback");
        assert_eq!(item.source_id.as_deref(), Some("https://example.com/review"));
        assert_eq!(
            item.content.as_deref(),
            Some("NS400Z Review\nPunchy engine, firm ride.")
        );
        assert!(item.created_at.is_none());
    }

    #[test]
    fn result_without_link_is_dropped() {
        assert!(to_feedback(OrganicResult {
            link: None,
            title: Some("t".to_string()),
            snippet: None,
        })
        .is_none());
    }
}
