use axum::{
    extract::{Path, State},
    response::Response,
    Extension, Json,
};
use insight_pipeline::ProductRef;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{find_product, require_engine, stream_response, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct AskRequest {
    pub question: String,
}

/// Answer one question; the body streams fragments as they are generated.
pub(super) async fn ask(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
    Json(request): Json<AskRequest>,
) -> Result<Response, ApiError> {
    let product = find_product(&state, &req_id.0, product_id)?;
    if request.question.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "question must not be empty",
        ));
    }
    let engine = require_engine(&state, &req_id.0)?;

    tracing::info!(request_id = %req_id.0, product_id, "answering question");
    Ok(stream_response(
        engine.answer(&request.question, &ProductRef::from(&product)),
    ))
}

pub(super) async fn report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
) -> Result<Response, ApiError> {
    let product = find_product(&state, &req_id.0, product_id)?;
    let engine = require_engine(&state, &req_id.0)?;

    tracing::info!(request_id = %req_id.0, product_id, "generating report");
    Ok(stream_response(
        engine.generate_report(&ProductRef::from(&product)),
    ))
}
