use crate::app_config::{AppConfig, Environment, VectorBackend};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a plain
/// `HashMap` instead of mutating process state.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty strings count as unset so `.env` templates with blank keys behave.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("INSIGHT_ENV", "development"))?;
    let bind_addr = or_default("INSIGHT_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("INSIGHT_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("INSIGHT_LOG_LEVEL", "info");
    let products_path = PathBuf::from(or_default(
        "INSIGHT_PRODUCTS_PATH",
        "./config/products.yaml",
    ));
    let http_timeout_secs = parse_u64("INSIGHT_HTTP_TIMEOUT_SECS", "30")?;

    let tei_url = or_default("INSIGHT_TEI_URL", "http://localhost:8080");

    let vector_backend = parse_vector_backend(&or_default("INSIGHT_VECTOR_BACKEND", "flat"))?;
    let index_dir = PathBuf::from(or_default("INSIGHT_INDEX_DIR", "./data/index"));
    let qdrant_url = optional("QDRANT_URL");
    let qdrant_api_key = optional("QDRANT_API_KEY");
    let qdrant_collection = or_default("INSIGHT_QDRANT_COLLECTION", "feedback_reviews");
    let store_max_retries = parse_u32("INSIGHT_STORE_MAX_RETRIES", "3")?;
    let store_retry_backoff_ms = parse_u64("INSIGHT_STORE_RETRY_BACKOFF_MS", "500")?;
    let ingest_batch_size = parse_positive_usize("INSIGHT_INGEST_BATCH_SIZE", "100")?;

    let llm_base_url = or_default(
        "INSIGHT_LLM_BASE_URL",
        "https://api.fireworks.ai/inference/v1",
    );
    let llm_api_key = optional("INSIGHT_LLM_API_KEY");
    let llm_model = or_default(
        "INSIGHT_LLM_MODEL",
        "accounts/fireworks/models/deepseek-v3p1",
    );
    let llm_max_tokens = parse_u32("INSIGHT_LLM_MAX_TOKENS", "1024")?;
    let llm_temperature = or_default("INSIGHT_LLM_TEMPERATURE", "0.7")
        .parse::<f32>()
        .map_err(|e| invalid("INSIGHT_LLM_TEMPERATURE", e.to_string()))?;
    if !(0.0..=2.0).contains(&llm_temperature) {
        return Err(invalid(
            "INSIGHT_LLM_TEMPERATURE",
            format!("{llm_temperature} is outside 0.0..=2.0"),
        ));
    }
    let search_top_k = parse_positive_usize("INSIGHT_SEARCH_TOP_K", "50")?;
    let context_max_chars = parse_positive_usize("INSIGHT_CONTEXT_MAX_CHARS", "24000")?;

    let reddit_client_id = optional("REDDIT_CLIENT_ID");
    let reddit_client_secret = optional("REDDIT_CLIENT_SECRET");
    let reddit_user_agent = or_default("REDDIT_USER_AGENT", "insight/0.1 (feedback-research)");
    let youtube_api_key = optional("YOUTUBE_API_KEY");
    let serpapi_api_key = optional("SERPAPI_API_KEY");

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        products_path,
        http_timeout_secs,
        tei_url,
        vector_backend,
        index_dir,
        qdrant_url,
        qdrant_api_key,
        qdrant_collection,
        store_max_retries,
        store_retry_backoff_ms,
        ingest_batch_size,
        llm_base_url,
        llm_api_key,
        llm_model,
        llm_max_tokens,
        llm_temperature,
        search_top_k,
        context_max_chars,
        reddit_client_id,
        reddit_client_secret,
        reddit_user_agent,
        youtube_api_key,
        serpapi_api_key,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "INSIGHT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_vector_backend(s: &str) -> Result<VectorBackend, ConfigError> {
    match s {
        "flat" => Ok(VectorBackend::Flat),
        "qdrant" => Ok(VectorBackend::Qdrant),
        other => Err(ConfigError::InvalidEnvVar {
            var: "INSIGHT_VECTOR_BACKEND".to_string(),
            reason: format!("unknown backend '{other}' (expected 'flat' or 'qdrant')"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
