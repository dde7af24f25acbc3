use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "INSIGHT_ENV"));
}

#[test]
fn build_app_config_succeeds_with_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let result = build_app_config(lookup_from_map(&map));
    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    let cfg = result.unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3000");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.vector_backend, VectorBackend::Flat);
    assert_eq!(cfg.qdrant_collection, "feedback_reviews");
    assert_eq!(cfg.ingest_batch_size, 100);
    assert_eq!(cfg.search_top_k, 50);
    assert_eq!(cfg.context_max_chars, 24_000);
    assert_eq!(cfg.llm_max_tokens, 1024);
    assert!((cfg.llm_temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(cfg.store_max_retries, 3);
    assert!(cfg.qdrant_url.is_none());
    assert!(cfg.llm_api_key.is_none());
    assert!(cfg.youtube_api_key.is_none());
}

#[test]
fn build_app_config_fails_with_invalid_bind_addr() {
    let mut map = HashMap::new();
    map.insert("INSIGHT_BIND_ADDR", "not-a-socket-addr");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "INSIGHT_BIND_ADDR"),
        "expected InvalidEnvVar(INSIGHT_BIND_ADDR), got: {result:?}"
    );
}

#[test]
fn build_app_config_selects_qdrant_backend() {
    let mut map = HashMap::new();
    map.insert("INSIGHT_VECTOR_BACKEND", "qdrant");
    map.insert("QDRANT_URL", "http://localhost:6333");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.vector_backend, VectorBackend::Qdrant);
    assert_eq!(cfg.qdrant_url.as_deref(), Some("http://localhost:6333"));
}

#[test]
fn build_app_config_rejects_unknown_backend() {
    let mut map = HashMap::new();
    map.insert("INSIGHT_VECTOR_BACKEND", "faiss");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "INSIGHT_VECTOR_BACKEND"),
        "expected InvalidEnvVar(INSIGHT_VECTOR_BACKEND), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_zero_batch_size() {
    let mut map = HashMap::new();
    map.insert("INSIGHT_INGEST_BATCH_SIZE", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "INSIGHT_INGEST_BATCH_SIZE"),
        "expected InvalidEnvVar(INSIGHT_INGEST_BATCH_SIZE), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_non_numeric_top_k() {
    let mut map = HashMap::new();
    map.insert("INSIGHT_SEARCH_TOP_K", "lots");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "INSIGHT_SEARCH_TOP_K"),
        "expected InvalidEnvVar(INSIGHT_SEARCH_TOP_K), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_out_of_range_temperature() {
    let mut map = HashMap::new();
    map.insert("INSIGHT_LLM_TEMPERATURE", "3.5");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "INSIGHT_LLM_TEMPERATURE"),
        "expected InvalidEnvVar(INSIGHT_LLM_TEMPERATURE), got: {result:?}"
    );
}

#[test]
fn blank_optional_credentials_are_treated_as_unset() {
    let mut map = HashMap::new();
    map.insert("YOUTUBE_API_KEY", "   ");
    map.insert("SERPAPI_API_KEY", "serp-key");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.youtube_api_key.is_none());
    assert_eq!(cfg.serpapi_api_key.as_deref(), Some("serp-key"));
}

#[test]
fn debug_output_redacts_secrets() {
    let mut map = HashMap::new();
    map.insert("INSIGHT_LLM_API_KEY", "sk-very-secret");
    map.insert("QDRANT_API_KEY", "qdrant-secret");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("sk-very-secret"));
    assert!(!rendered.contains("qdrant-secret"));
    assert!(rendered.contains("[redacted]"));
}
