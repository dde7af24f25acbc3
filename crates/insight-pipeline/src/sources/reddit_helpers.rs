//! Reddit post conversion helpers.

use chrono::{DateTime, SecondsFormat};
use insight_core::FeedbackSource;

use super::reddit::Post;
use crate::types::RawFeedback;

fn is_placeholder(body: &str) -> bool {
    body == "[deleted]" || body == "[removed]"
}

/// Convert a listing entry into raw feedback. Posts without an id are dropped.
pub(super) fn to_feedback(post: &Post) -> Option<RawFeedback> {
    let id = post.data.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;

    let title = post.data.title.as_deref().map(str::trim).unwrap_or_default();
    let body = post
        .data
        .selftext
        .as_deref()
        .map(str::trim)
        .filter(|body| !body.is_empty() && !is_placeholder(body))
        .unwrap_or_default();
    let content = format!("{title} {body}").trim().to_string();

    let created_at = post
        .data
        .created_utc
        .and_then(|secs| {
            #[allow(clippy::cast_possible_truncation)]
            DateTime::from_timestamp(secs.trunc() as i64, 0)
        })
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true));

    Some(RawFeedback {
        source: FeedbackSource::RedditPost,
        source_id: Some(format!("reddit_post_{id}")),
        content: (!content.is_empty()).then_some(content),
        created_at,
        rating: None,
    })
}
