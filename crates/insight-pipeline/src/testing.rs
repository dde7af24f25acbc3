//! In-process fakes for the embedder, store, synthesizer, and scrapers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use insight_core::{FeedbackSource, ProductConfig};

use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::sources::FeedbackCollector;
use crate::synthesis::{SynthesisRequest, SynthesisStream, Synthesizer};
use crate::types::{IndexedPoint, RawFeedback, ScoredPoint, SearchFilter};
use crate::vector_store::{FlatFileStore, VectorStore};

/// Content containing this marker cannot be embedded.
pub(crate) const EMBED_FAIL_MARKER: &str = "EMBED_FAIL";
/// Content containing this marker embeds to an all-zero vector.
pub(crate) const ZERO_VECTOR_MARKER: &str = "ZERO_VECTOR";

pub(crate) const TEST_DIMENSION: usize = 16;

/// Bag-of-words embedder: each word lands in a bucket picked by a stable
/// byte hash, so texts sharing words end up close together.
#[derive(Default)]
pub(crate) struct KeywordEmbedder {
    pub(crate) batch_calls: AtomicUsize,
}

impl KeywordEmbedder {
    fn vector(text: &str) -> Result<Vec<f32>, PipelineError> {
        if text.trim().is_empty() || text.contains(EMBED_FAIL_MARKER) {
            return Err(PipelineError::EmbeddingUnavailable(format!(
                "cannot embed {text:?}"
            )));
        }
        let mut vector = vec![0.0_f32; TEST_DIMENSION];
        if text.contains(ZERO_VECTOR_MARKER) {
            return Ok(vector);
        }
        // Constant bias keeps every vector non-zero.
        vector[0] = 0.1;
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let bucket = word
                .bytes()
                .fold(7_usize, |acc, b| acc.wrapping_mul(31).wrapping_add(usize::from(b)));
            vector[1 + bucket % (TEST_DIMENSION - 1)] += 1.0;
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|text| Self::vector(text)).collect()
    }
}

/// In-memory flat store that records committed batch sizes and can be told
/// to fail.
pub(crate) struct RecordingStore {
    inner: FlatFileStore,
    batches: Mutex<Vec<usize>>,
    /// Upserts fail once this many batches have been committed.
    fail_after: Option<usize>,
    pub(crate) upsert_attempts: AtomicUsize,
    pub(crate) search_fails: AtomicBool,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: FlatFileStore::in_memory(TEST_DIMENSION),
            batches: Mutex::new(Vec::new()),
            fail_after: None,
            upsert_attempts: AtomicUsize::new(0),
            search_fails: AtomicBool::new(false),
        }
    }

    pub(crate) fn failing_after(batches: usize) -> Self {
        Self {
            fail_after: Some(batches),
            ..Self::new()
        }
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().expect("batches lock").clone()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }

    async fn upsert_many(&self, points: Vec<IndexedPoint>) -> Result<(), PipelineError> {
        self.upsert_attempts.fetch_add(1, Ordering::SeqCst);
        let committed = self.batches.lock().expect("batches lock").len();
        if self.fail_after.is_some_and(|limit| committed >= limit) {
            return Err(PipelineError::StoreUnavailable("injected failure".to_string()));
        }
        let size = points.len();
        self.inner.upsert_many(points).await?;
        self.batches.lock().expect("batches lock").push(size);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, PipelineError> {
        if self.search_fails.load(Ordering::SeqCst) {
            return Err(PipelineError::StoreUnavailable("search offline".to_string()));
        }
        self.inner.search(query, k, filter).await
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        self.inner.count().await
    }
}

/// Replays fixed fragments for every call, with optional failures.
pub(crate) struct ScriptedSynthesizer {
    fragments: Vec<String>,
    /// Zero-based call numbers whose stream fails to open.
    fail_open_calls: HashSet<usize>,
    /// Emit this many fragments, then a mid-stream failure.
    interrupt_after: Option<usize>,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl ScriptedSynthesizer {
    pub(crate) fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| (*f).to_string()).collect(),
            fail_open_calls: HashSet::new(),
            interrupt_after: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_open_on(mut self, call: usize) -> Self {
        self.fail_open_calls.insert(call);
        self
    }

    pub(crate) fn interrupted_after(mut self, fragments: usize) -> Self {
        self.interrupt_after = Some(fragments);
        self
    }

    pub(crate) fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn stream(&self, request: SynthesisRequest) -> Result<SynthesisStream, PipelineError> {
        let call = {
            let mut requests = self.requests.lock().expect("requests lock");
            requests.push(request);
            requests.len() - 1
        };
        if self.fail_open_calls.contains(&call) {
            return Err(PipelineError::SynthesisFailure("provider rejected call".to_string()));
        }

        let mut items: Vec<Result<String, PipelineError>> = match self.interrupt_after {
            Some(n) => self.fragments.iter().take(n).cloned().map(Ok).collect(),
            None => self.fragments.iter().cloned().map(Ok).collect(),
        };
        if self.interrupt_after.is_some() {
            items.push(Err(PipelineError::SynthesisFailure("connection reset".to_string())));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Collector returning a canned result.
pub(crate) struct StaticCollector {
    source: FeedbackSource,
    result: Result<Vec<RawFeedback>, String>,
}

impl StaticCollector {
    pub(crate) fn ok(source: FeedbackSource, items: Vec<RawFeedback>) -> Self {
        Self {
            source,
            result: Ok(items),
        }
    }

    pub(crate) fn failing(source: FeedbackSource, message: &str) -> Self {
        Self {
            source,
            result: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl FeedbackCollector for StaticCollector {
    fn source(&self) -> FeedbackSource {
        self.source
    }

    async fn collect(&self, _product: &ProductConfig) -> Result<Vec<RawFeedback>, PipelineError> {
        self.result
            .clone()
            .map_err(|message| PipelineError::source_failed(self.source, message))
    }
}

pub(crate) fn raw(source: FeedbackSource, id: &str, content: &str) -> RawFeedback {
    RawFeedback {
        source,
        source_id: Some(id.to_string()),
        content: Some(content.to_string()),
        created_at: None,
        rating: None,
    }
}

pub(crate) fn product(id: i64, name: &str) -> ProductConfig {
    ProductConfig {
        id,
        name: name.to_string(),
        search_query: None,
        reddit_subreddits: Vec::new(),
        youtube_keywords: Vec::new(),
        google_search: false,
        max_posts: None,
        max_videos: None,
        max_results: None,
    }
}
