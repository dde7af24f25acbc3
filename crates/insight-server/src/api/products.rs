use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use insight_core::FeedbackSource;
use insight_pipeline::collectors_for;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{find_product, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: i64,
    name: String,
    query: String,
    reddit_subreddits: Vec<String>,
    youtube_keywords: Vec<String>,
    google_search: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct IngestAccepted {
    product_id: i64,
    status: &'static str,
    sources: usize,
    /// Sources the product asks for whose credentials are missing.
    unavailable: Vec<FeedbackSource>,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<ProductItem>>> {
    let data = state
        .catalog
        .products
        .iter()
        .map(|product| ProductItem {
            id: product.id,
            name: product.name.clone(),
            query: product.query().to_string(),
            reddit_subreddits: product.reddit_subreddits.clone(),
            youtube_keywords: product.youtube_keywords.clone(),
            google_search: product.google_search,
        })
        .collect();

    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    })
}

/// Start an ingestion run in the background and return immediately.
pub(super) async fn trigger_ingest(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<IngestAccepted>>), ApiError> {
    let product = find_product(&state, &req_id.0, product_id)?;
    let plan = collectors_for(&state.config, &product);
    let sources = plan.collectors.len();
    let unavailable = plan.unavailable.clone();

    let ingestion = state.ingestion.clone();
    let request_id = req_id.0.clone();
    tokio::spawn(async move {
        match ingestion.run(&product, &plan).await {
            Ok(report) => tracing::info!(
                request_id = %request_id,
                product_id = report.product_id,
                stored = report.items_stored,
                skipped = report.items_skipped,
                "background ingestion finished"
            ),
            Err(e) => tracing::error!(
                request_id = %request_id,
                product_id = product.id,
                error = %e,
                "background ingestion failed"
            ),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: IngestAccepted {
                product_id,
                status: "accepted",
                sources,
                unavailable,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
