use serde::{Deserialize, Serialize};

/// External platform a feedback item was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    YoutubeComment,
    RedditPost,
    GoogleSearch,
}

impl FeedbackSource {
    pub const ALL: [FeedbackSource; 3] = [
        FeedbackSource::YoutubeComment,
        FeedbackSource::RedditPost,
        FeedbackSource::GoogleSearch,
    ];

    /// Stable machine key stored in point payloads and hashed into point IDs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackSource::YoutubeComment => "youtube_comment",
            FeedbackSource::RedditPost => "reddit_post",
            FeedbackSource::GoogleSearch => "google_search",
        }
    }

    /// Human-readable label used when quoting feedback back to a reader.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FeedbackSource::YoutubeComment => "YouTube Comment",
            FeedbackSource::RedditPost => "Reddit",
            FeedbackSource::GoogleSearch => "Google Search Result",
        }
    }

    /// Parse a stored machine key back into a source.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == key)
    }
}

impl std::fmt::Display for FeedbackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_from_key() {
        for source in FeedbackSource::ALL {
            assert_eq!(FeedbackSource::from_key(source.as_str()), Some(source));
        }
        assert_eq!(FeedbackSource::from_key("myspace"), None);
    }

    #[test]
    fn serde_uses_snake_case_keys() {
        let json = serde_yaml::to_string(&FeedbackSource::RedditPost).unwrap();
        assert_eq!(json.trim(), "reddit_post");
    }
}
