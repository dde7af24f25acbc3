use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which vector index backs the feedback store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    /// Flat inner-product index persisted to `index_dir`.
    Flat,
    /// Managed Qdrant collection with payload filtering.
    Qdrant,
}

impl std::fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorBackend::Flat => write!(f, "flat"),
            VectorBackend::Qdrant => write!(f, "qdrant"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub products_path: PathBuf,
    pub http_timeout_secs: u64,

    pub tei_url: String,

    pub vector_backend: VectorBackend,
    pub index_dir: PathBuf,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
    pub store_max_retries: u32,
    pub store_retry_backoff_ms: u64,
    pub ingest_batch_size: usize,

    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub search_top_k: usize,
    pub context_max_chars: usize,

    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_user_agent: String,
    pub youtube_api_key: Option<String>,
    pub serpapi_api_key: Option<String>,
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[redacted]")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("products_path", &self.products_path)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("tei_url", &self.tei_url)
            .field("vector_backend", &self.vector_backend)
            .field("index_dir", &self.index_dir)
            .field("qdrant_url", &self.qdrant_url)
            .field("qdrant_api_key", &redact(self.qdrant_api_key.as_ref()))
            .field("qdrant_collection", &self.qdrant_collection)
            .field("store_max_retries", &self.store_max_retries)
            .field("store_retry_backoff_ms", &self.store_retry_backoff_ms)
            .field("ingest_batch_size", &self.ingest_batch_size)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_api_key", &redact(self.llm_api_key.as_ref()))
            .field("llm_model", &self.llm_model)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("llm_temperature", &self.llm_temperature)
            .field("search_top_k", &self.search_top_k)
            .field("context_max_chars", &self.context_max_chars)
            .field("reddit_client_id", &redact(self.reddit_client_id.as_ref()))
            .field(
                "reddit_client_secret",
                &redact(self.reddit_client_secret.as_ref()),
            )
            .field("reddit_user_agent", &self.reddit_user_agent)
            .field("youtube_api_key", &redact(self.youtube_api_key.as_ref()))
            .field("serpapi_api_key", &redact(self.serpapi_api_key.as_ref()))
            .finish()
    }
}
