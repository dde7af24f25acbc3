//! YouTube Data API v3 comment collector.
//!
//! Searches videos for the product query, then walks each video's top-level
//! comment threads and keeps comments that mention one of the product's
//! keywords.

use std::time::Duration;

use async_trait::async_trait;
use insight_core::{FeedbackSource, ProductConfig};
use serde::Deserialize;

use super::{http_client, FeedbackCollector, DEFAULT_MAX_VIDEOS};
use crate::error::PipelineError;
use crate::types::RawFeedback;

const API_URL: &str = "https://www.googleapis.com/youtube/v3";
const COMMENTS_PER_PAGE: usize = 100;
/// Upper bound on comment pages fetched per video.
const MAX_COMMENT_PAGES: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadsResponse {
    #[serde(default)]
    items: Vec<CommentThread>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    id: String,
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    text_display: Option<String>,
    published_at: Option<String>,
}

pub struct YouTubeCollector {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl YouTubeCollector {
    #[must_use]
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: http_client(FeedbackSource::YoutubeComment, timeout),
            api_key,
            api_url: API_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    async fn video_ids(&self, query: &str, max_videos: usize) -> Result<Vec<String>, PipelineError> {
        let max_results = max_videos.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.api_url))
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("order", "relevance"),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| youtube_error(format!("video search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(youtube_error(format!(
                "video search failed with status {}",
                response.status()
            )));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| youtube_error(format!("video search parse error: {e}")))?;

        Ok(search
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    async fn matching_comments(
        &self,
        video_id: &str,
        keywords: &[String],
    ) -> Result<Vec<RawFeedback>, PipelineError> {
        let mut comments = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_COMMENT_PAGES {
            let mut params: Vec<(&str, String)> = vec![
                ("part", "snippet".to_string()),
                ("videoId", video_id.to_string()),
                ("maxResults", COMMENTS_PER_PAGE.to_string()),
                ("textFormat", "plainText".to_string()),
                ("key", self.api_key.clone()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(format!("{}/commentThreads", self.api_url))
                .query(&params)
                .send()
                .await
                .map_err(|e| youtube_error(format!("comment request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(youtube_error(format!(
                    "comments for {video_id} failed with status {}",
                    response.status()
                )));
            }

            let page: CommentThreadsResponse = response
                .json()
                .await
                .map_err(|e| youtube_error(format!("comment parse error: {e}")))?;

            for thread in page.items {
                let snippet = thread.snippet.top_level_comment.snippet;
                let Some(text) = snippet.text_display else {
                    continue;
                };
                if !mentions_keyword(&text, keywords) {
                    continue;
                }
                comments.push(RawFeedback {
                    source: FeedbackSource::YoutubeComment,
                    source_id: Some(format!("yt_comment_{}", thread.id)),
                    content: Some(text),
                    created_at: snippet.published_at,
                    rating: None,
                });
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(comments)
    }
}

/// Case-insensitive substring match; an empty keyword list keeps everything.
fn mentions_keyword(text: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

#[async_trait]
impl FeedbackCollector for YouTubeCollector {
    fn source(&self) -> FeedbackSource {
        FeedbackSource::YoutubeComment
    }

    async fn collect(&self, product: &ProductConfig) -> Result<Vec<RawFeedback>, PipelineError> {
        let max_videos = product.max_videos.unwrap_or(DEFAULT_MAX_VIDEOS);
        let video_ids = self.video_ids(product.query(), max_videos).await?;
        tracing::debug!(
            product_id = product.id,
            videos = video_ids.len(),
            "YouTube videos found"
        );

        let mut feedback = Vec::new();
        for video_id in &video_ids {
            // Comments are often disabled on individual videos; skip those.
            match self
                .matching_comments(video_id, &product.youtube_keywords)
                .await
            {
                Ok(comments) => feedback.extend(comments),
                Err(e) => {
                    tracing::warn!(
                        product_id = product.id,
                        video_id = video_id.as_str(),
                        error = %e,
                        "could not retrieve YouTube comments"
                    );
                }
            }
        }

        Ok(feedback)
    }
}

fn youtube_error(message: String) -> PipelineError {
    PipelineError::source_failed(FeedbackSource::YoutubeComment, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_match_is_case_insensitive() {
        let keywords = vec!["Mileage".to_string(), "brakes".to_string()];
        assert!(mentions_keyword("The MILEAGE is about 30", &keywords));
        assert!(mentions_keyword("brakes feel weak", &keywords));
        assert!(!mentions_keyword("nice colour", &keywords));
    }

    #[test]
    fn no_keywords_keeps_every_comment() {
        assert!(mentions_keyword("anything", &[]));
    }
}
