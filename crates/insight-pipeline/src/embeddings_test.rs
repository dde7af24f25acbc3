use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

#[tokio::test]
async fn connect_probes_dimension() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.1, 0.2, 0.3]])))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::connect(&server.uri(), Duration::from_secs(5))
        .await
        .expect("connect");
    assert_eq!(embedder.dimension(), 3);
}

#[tokio::test]
async fn connect_fails_as_configuration_when_tei_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = TeiEmbedder::connect(&server.uri(), Duration::from_secs(5))
        .await
        .expect_err("probe must fail");
    assert!(err.is_configuration(), "got {err:?}");
}

#[tokio::test]
async fn embed_returns_vectors_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_partial_json(json!({ "inputs": ["a", "b"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[1.0, 0.0], [0.0, 1.0]])))
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::with_dimension(&server.uri(), 2);
    let vectors = embedder.embed(&["a", "b"]).await.expect("embed");
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn empty_text_fails_without_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[1.0]])))
        .expect(0)
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::with_dimension(&server.uri(), 1);
    let err = embedder.embed_one("   ").await.expect_err("empty text");
    assert!(matches!(err, PipelineError::EmbeddingUnavailable(_)));
}

#[tokio::test]
async fn server_error_is_embedding_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::with_dimension(&server.uri(), 2);
    let err = embedder.embed_one("hello").await.expect_err("500");
    assert!(matches!(err, PipelineError::EmbeddingUnavailable(_)));
}

#[tokio::test]
async fn count_mismatch_is_embedding_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[1.0, 0.0]])))
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::with_dimension(&server.uri(), 2);
    let err = embedder.embed(&["a", "b"]).await.expect_err("count mismatch");
    assert!(matches!(err, PipelineError::EmbeddingUnavailable(_)));
}

#[tokio::test]
async fn wrong_vector_length_is_dimension_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[1.0, 0.0, 0.5]])))
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::with_dimension(&server.uri(), 2);
    let err = embedder.embed_one("hello").await.expect_err("dimension");
    assert!(matches!(
        err,
        PipelineError::DimensionMismatch {
            expected: 2,
            got: 3
        }
    ));
}
