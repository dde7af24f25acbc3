use std::sync::atomic::Ordering;

use insight_core::FeedbackSource;

use super::*;
use crate::ingest::{IngestSettings, IngestionCoordinator};
use crate::synthesis::Role;
use crate::testing::{raw, KeywordEmbedder, RecordingStore, ScriptedSynthesizer, EMBED_FAIL_MARKER};

struct Harness {
    store: Arc<RecordingStore>,
    synthesizer: Arc<ScriptedSynthesizer>,
    engine: InsightEngine,
    ingestion: IngestionCoordinator,
}

fn harness(synthesizer: ScriptedSynthesizer) -> Harness {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::default());
    let store = Arc::new(RecordingStore::new());
    let synthesizer = Arc::new(synthesizer);
    let analyzer = SentimentAnalyzer::shared();
    let engine = InsightEngine::new(
        Arc::clone(&embedder),
        store.clone(),
        Arc::clone(&analyzer),
        synthesizer.clone(),
        EngineSettings {
            max_tokens: 300,
            ..EngineSettings::default()
        },
    );
    let ingestion = IngestionCoordinator::new(
        embedder,
        store.clone(),
        analyzer,
        IngestSettings {
            retry_backoff_ms: 1,
            ..IngestSettings::default()
        },
    );
    Harness {
        store,
        synthesizer,
        engine,
        ingestion,
    }
}

fn product(id: i64) -> ProductRef {
    ProductRef {
        id,
        name: format!("Product {id}"),
    }
}

async fn collect(stream: FragmentStream) -> Vec<String> {
    stream.collect().await
}

#[tokio::test]
async fn reingested_item_is_answered_in_scope_and_absent_elsewhere() {
    let h = harness(ScriptedSynthesizer::new(&["Riders ", "praise the mileage."]));

    h.ingestion
        .ingest(
            1,
            vec![raw(FeedbackSource::RedditPost, "reddit_post_m1", "mileage is poor in the city")],
        )
        .await
        .expect("first run");
    h.ingestion
        .ingest(
            1,
            vec![raw(FeedbackSource::RedditPost, "reddit_post_m1", "mileage is great on the highway")],
        )
        .await
        .expect("second run");
    assert_eq!(h.store.count().await.expect("count"), 1);

    let fragments = collect(h.engine.answer("How is the mileage?", &product(1))).await;
    assert_eq!(fragments, vec!["Riders ".to_string(), "praise the mileage.".to_string()]);

    let requests = h.synthesizer.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.max_tokens, 300);
    assert_eq!(request.messages[0].role, Role::System);
    assert_eq!(request.messages[1].role, Role::User);
    let user = &request.messages[1].content;
    assert!(user.contains("[POSITIVE] mileage is great on the highway — Reddit"), "{user}");
    assert!(!user.contains("poor in the city"));
    assert!(user.contains("How is the mileage?"));

    let elsewhere = collect(h.engine.answer("How is the mileage?", &product(2))).await;
    assert_eq!(elsewhere, vec![NO_RESULTS_MESSAGE.to_string()]);
    assert_eq!(h.synthesizer.requests().len(), 1, "no synthesis without results");
}

#[tokio::test]
async fn empty_store_yields_the_no_results_fragment() {
    let h = harness(ScriptedSynthesizer::new(&["unused"]));
    let fragments = collect(h.engine.answer("anything?", &product(1))).await;
    assert_eq!(fragments, vec![NO_RESULTS_MESSAGE.to_string()]);
}

#[tokio::test]
async fn blank_question_fails_with_one_fragment() {
    let h = harness(ScriptedSynthesizer::new(&["unused"]));
    let fragments = collect(h.engine.answer("   ", &product(1))).await;
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].starts_with("Unable to process the question"));
    assert!(h.synthesizer.requests().is_empty());
}

#[tokio::test]
async fn embedding_failure_fails_with_one_fragment() {
    let h = harness(ScriptedSynthesizer::new(&["unused"]));
    let question = format!("what about {EMBED_FAIL_MARKER}?");
    let fragments = collect(h.engine.answer(&question, &product(1))).await;
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].starts_with("Unable to process the question"));
}

#[tokio::test]
async fn unavailable_store_is_distinct_from_no_results() {
    let h = harness(ScriptedSynthesizer::new(&["unused"]));
    h.store.search_fails.store(true, Ordering::SeqCst);

    let fragments = collect(h.engine.answer("brakes?", &product(1))).await;

    assert_eq!(fragments.len(), 1);
    assert_ne!(fragments[0], NO_RESULTS_MESSAGE);
    assert!(fragments[0].contains("unavailable"));
}

#[tokio::test]
async fn synthesis_that_cannot_start_emits_a_failure_fragment() {
    let h = harness(ScriptedSynthesizer::new(&["unused"]).failing_open_on(0));
    h.ingestion
        .ingest(1, vec![raw(FeedbackSource::GoogleSearch, "https://x/1", "solid brakes")])
        .await
        .expect("ingest");

    let fragments = collect(h.engine.answer("brakes?", &product(1))).await;

    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].starts_with("The analysis could not be generated"));
}

#[tokio::test]
async fn interrupted_synthesis_keeps_partial_output_and_says_so() {
    let h = harness(ScriptedSynthesizer::new(&["one ", "two ", "three"]).interrupted_after(2));
    h.ingestion
        .ingest(1, vec![raw(FeedbackSource::GoogleSearch, "https://x/1", "solid brakes")])
        .await
        .expect("ingest");

    let fragments = collect(h.engine.answer("brakes?", &product(1))).await;

    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[..2], ["one ".to_string(), "two ".to_string()]);
    assert!(fragments[2].contains("[analysis interrupted"));
}

#[tokio::test]
async fn consumer_can_stop_early() {
    let h = harness(ScriptedSynthesizer::new(&["a", "b", "c"]));
    h.ingestion
        .ingest(1, vec![raw(FeedbackSource::GoogleSearch, "https://x/1", "solid brakes")])
        .await
        .expect("ingest");

    let first: Vec<String> = h.engine.answer("brakes?", &product(1)).take(1).collect().await;
    assert_eq!(first, vec!["a".to_string()]);
}

#[tokio::test]
async fn report_runs_every_section_even_when_one_fails() {
    // Call 1 is the "Pros" section.
    let h = harness(ScriptedSynthesizer::new(&["insight"]).failing_open_on(1));
    h.ingestion
        .ingest(
            5,
            vec![
                raw(FeedbackSource::RedditPost, "reddit_post_1", "great engine and excellent brakes"),
                raw(FeedbackSource::YoutubeComment, "yt_comment_1", "please add cruise control"),
            ],
        )
        .await
        .expect("ingest");

    let report = collect(h.engine.generate_report(&product(5))).await.concat();

    let summary = report.find("## Overall Summary\n\n").expect("summary header");
    let pros = report.find("## Pros\n\n").expect("pros header");
    let cons = report.find("## Cons\n\n").expect("cons header");
    let requests = report.find("## Feature Requests\n\n").expect("requests header");
    assert!(summary < pros && pros < cons && cons < requests);

    let pros_section = &report[pros..cons];
    assert!(pros_section.contains("The analysis could not be generated"));
    assert!(report[cons..requests].contains("insight"));
    assert!(report[requests..].contains("insight"));
    assert_eq!(h.synthesizer.requests().len(), 4);
}
