use std::sync::atomic::Ordering;

use chrono::{TimeZone, Utc};

use super::*;
use crate::sentiment::SentimentLabel;
use crate::sources::FeedbackCollector;
use crate::types::SearchFilter;
use crate::testing::{
    product, raw, KeywordEmbedder, RecordingStore, StaticCollector, EMBED_FAIL_MARKER,
    ZERO_VECTOR_MARKER,
};

fn settings(batch_size: usize) -> IngestSettings {
    IngestSettings {
        batch_size,
        max_retries: 3,
        retry_backoff_ms: 1,
    }
}

fn coordinator(
    store: Arc<RecordingStore>,
    batch_size: usize,
) -> (IngestionCoordinator, Arc<KeywordEmbedder>) {
    let embedder = Arc::new(KeywordEmbedder::default());
    let coordinator = IngestionCoordinator::new(
        embedder.clone(),
        store,
        SentimentAnalyzer::shared(),
        settings(batch_size),
    );
    (coordinator, embedder)
}

fn numbered(count: usize) -> Vec<RawFeedback> {
    (0..count)
        .map(|i| {
            raw(
                FeedbackSource::RedditPost,
                &format!("reddit_post_{i}"),
                &format!("post number {i} about mileage"),
            )
        })
        .collect()
}

async fn payload_for(store: &RecordingStore, product_id: i64, text: &str) -> FeedbackPayload {
    let query = KeywordEmbedder::default()
        .embed_one(text)
        .await
        .expect("embed query");
    store
        .search(&query, 1, Some(&SearchFilter::product(product_id)))
        .await
        .expect("search")
        .into_iter()
        .next()
        .expect("hit")
        .payload
}

#[tokio::test]
async fn reingesting_the_same_items_is_idempotent() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, _) = coordinator(store.clone(), 100);

    let first = coordinator.ingest(1, numbered(12)).await.expect("first run");
    let second = coordinator.ingest(1, numbered(12)).await.expect("second run");

    assert_eq!(first.items_stored, 12);
    assert_eq!(second.items_stored, 12);
    assert_eq!(store.count().await.expect("count"), 12);
}

#[tokio::test]
async fn upserts_in_fixed_size_batches() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, _) = coordinator(store.clone(), 100);

    let report = coordinator.ingest(1, numbered(250)).await.expect("ingest");

    assert_eq!(store.batch_sizes(), vec![100, 100, 50]);
    assert_eq!(report.batches_committed, 3);
    assert_eq!(report.items_found, 250);
    assert_eq!(report.items_stored, 250);
    assert_eq!(report.items_skipped, 0);
}

#[tokio::test]
async fn store_failure_keeps_committed_batches_and_fails_the_run() {
    let store = Arc::new(RecordingStore::failing_after(2));
    let (coordinator, _) = coordinator(store.clone(), 100);

    let err = coordinator
        .ingest(1, numbered(250))
        .await
        .expect_err("third batch must fail");

    assert!(matches!(err, PipelineError::StoreUnavailable(_)), "got {err:?}");
    assert_eq!(store.count().await.expect("count"), 200);
    // Two commits, then the third batch: first attempt plus three retries.
    assert_eq!(store.upsert_attempts.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn records_without_id_or_content_are_skipped() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, _) = coordinator(store.clone(), 10);

    let mut no_id = raw(FeedbackSource::RedditPost, "", "has text");
    no_id.source_id = None;
    let mut no_content = raw(FeedbackSource::YoutubeComment, "yt_comment_1", "");
    no_content.content = None;
    let only_noise = raw(
        FeedbackSource::YoutubeComment,
        "yt_comment_2",
        "  https://example.com @someone  ",
    );
    let good = raw(FeedbackSource::RedditPost, "reddit_post_ok", "Great bike overall");

    let report = coordinator
        .ingest(1, vec![no_id, no_content, only_noise, good])
        .await
        .expect("ingest");

    assert_eq!(report.items_found, 4);
    assert_eq!(report.items_stored, 1);
    assert_eq!(report.items_skipped, 3);
    assert_eq!(store.count().await.expect("count"), 1);
}

#[tokio::test]
async fn duplicate_ids_collapse_to_the_last_occurrence() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, _) = coordinator(store.clone(), 10);

    let report = coordinator
        .ingest(
            1,
            vec![
                raw(FeedbackSource::RedditPost, "reddit_post_dup", "first draft mileage"),
                raw(FeedbackSource::RedditPost, "reddit_post_dup", "edited mileage review"),
            ],
        )
        .await
        .expect("ingest");

    assert_eq!(report.items_stored, 1);
    assert_eq!(report.items_skipped, 1);
    let payload = payload_for(&store, 1, "mileage").await;
    assert_eq!(payload.content, "edited mileage review");
}

#[tokio::test]
async fn one_unembeddable_item_does_not_sink_its_batch() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, embedder) = coordinator(store.clone(), 10);

    let report = coordinator
        .ingest(
            1,
            vec![
                raw(FeedbackSource::RedditPost, "reddit_post_a", "smooth ride"),
                raw(
                    FeedbackSource::RedditPost,
                    "reddit_post_b",
                    &format!("broken {EMBED_FAIL_MARKER}"),
                ),
                raw(FeedbackSource::RedditPost, "reddit_post_c", "bad brakes"),
            ],
        )
        .await
        .expect("ingest");

    assert_eq!(report.items_stored, 2);
    assert_eq!(report.items_skipped, 1);
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 4, "one batch call, three singles");
}

#[tokio::test]
async fn zero_norm_embedding_skips_only_that_item() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, embedder) = coordinator(store.clone(), 3);

    let mut items = numbered(5);
    items.insert(
        2,
        raw(
            FeedbackSource::YoutubeComment,
            "yt_comment_zero",
            &format!("silent {ZERO_VECTOR_MARKER}"),
        ),
    );

    let report = coordinator.ingest(1, items).await.expect("ingest");

    assert_eq!(report.items_found, 6);
    assert_eq!(report.items_stored, 5);
    assert_eq!(report.items_skipped, 1);
    assert_eq!(store.count().await.expect("count"), 5);
    assert_eq!(store.batch_sizes(), vec![3, 2]);
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 2, "no per-item fallback needed");
}

#[tokio::test]
async fn payload_carries_scope_sentiment_and_timestamp() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, _) = coordinator(store.clone(), 10);

    let mut dated = raw(
        FeedbackSource::YoutubeComment,
        "yt_comment_9",
        "I love the engine, it is excellent",
    );
    dated.created_at = Some("2024-03-05T10:15:00Z".to_string());
    dated.rating = Some(4.0);
    let mut undated = raw(
        FeedbackSource::RedditPost,
        "reddit_post_9",
        "terrible vibration and awful seat",
    );
    undated.created_at = Some("last tuesday".to_string());

    coordinator.ingest(7, vec![dated]).await.expect("ingest dated");
    coordinator.ingest(8, vec![undated]).await.expect("ingest undated");

    let positive = payload_for(&store, 7, "love the engine excellent").await;
    assert_eq!(positive.product_id, 7);
    assert_eq!(positive.source, FeedbackSource::YoutubeComment);
    assert_eq!(positive.external_id, "yt_comment_9");
    assert_eq!(positive.sentiment_label, SentimentLabel::Positive);
    assert_eq!(positive.rating, Some(4.0));
    assert_eq!(
        positive.created_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap())
    );

    let negative = payload_for(&store, 8, "terrible vibration awful seat").await;
    assert_eq!(negative.sentiment_label, SentimentLabel::Negative);
    assert!(negative.created_at.is_none(), "malformed date is dropped, not fatal");
}

#[tokio::test]
async fn run_reports_failed_and_empty_sources() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, _) = coordinator(store.clone(), 10);

    let collectors: Vec<Arc<dyn FeedbackCollector>> = vec![
        Arc::new(StaticCollector::failing(FeedbackSource::YoutubeComment, "quota exceeded")),
        Arc::new(StaticCollector::ok(FeedbackSource::GoogleSearch, Vec::new())),
        Arc::new(StaticCollector::ok(FeedbackSource::RedditPost, numbered(3))),
    ];

    let report = coordinator
        .run(&product(3, "NS400Z"), &SourcePlan::from(collectors))
        .await
        .expect("run");

    assert_eq!(report.product_id, 3);
    assert_eq!(report.items_stored, 3);
    assert_eq!(report.failed_sources, vec![FeedbackSource::YoutubeComment]);
    assert_eq!(
        report.empty_sources,
        vec![FeedbackSource::YoutubeComment, FeedbackSource::GoogleSearch]
    );
}

#[tokio::test]
async fn run_lists_sources_without_credentials_as_empty() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, _) = coordinator(store.clone(), 10);

    let sources = SourcePlan {
        collectors: vec![Arc::new(StaticCollector::ok(FeedbackSource::RedditPost, numbered(2)))
            as Arc<dyn FeedbackCollector>],
        unavailable: vec![FeedbackSource::YoutubeComment, FeedbackSource::GoogleSearch],
    };

    let report = coordinator
        .run(&product(3, "NS400Z"), &sources)
        .await
        .expect("run");

    assert_eq!(report.items_stored, 2);
    assert!(report.failed_sources.is_empty());
    assert_eq!(
        report.empty_sources,
        vec![FeedbackSource::YoutubeComment, FeedbackSource::GoogleSearch]
    );
}

#[tokio::test]
async fn run_with_nothing_collected_commits_nothing() {
    let store = Arc::new(RecordingStore::new());
    let (coordinator, _) = coordinator(store.clone(), 10);

    let report = coordinator
        .run(&product(3, "NS400Z"), &SourcePlan::default())
        .await
        .expect("run");

    assert_eq!(report, IngestReport { product_id: 3, ..IngestReport::default() });
    assert!(store.batch_sizes().is_empty());
}

#[test]
fn zero_batch_size_is_clamped() {
    let (coordinator, _) = coordinator(Arc::new(RecordingStore::new()), 0);
    assert_eq!(coordinator.settings.batch_size, 1);
}

#[test]
fn parses_rfc3339_and_naive_timestamps() {
    let expected = Utc.with_ymd_and_hms(2024, 5, 29, 16, 26, 40).unwrap();
    assert_eq!(parse_created_at("2024-05-29T16:26:40Z").unwrap(), expected);
    assert_eq!(parse_created_at("2024-05-29T18:26:40+02:00").unwrap(), expected);
    assert_eq!(parse_created_at("2024-05-29T16:26:40").unwrap(), expected);
    assert_eq!(parse_created_at("2024-05-29 16:26:40.000").unwrap(), expected);
    assert_eq!(
        parse_created_at("2024-05-29").unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 29, 0, 0, 0).unwrap()
    );
    assert!(parse_created_at("yesterday").is_err());
    assert!(parse_created_at("").is_err());
}
