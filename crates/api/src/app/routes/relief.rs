use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use relief_core::AllocationCandidate;

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/recommend", post(recommend))
        .route("/allocate", post(allocate))
        .route("/commit", post(commit))
}

/// Preview: recommendation plus what it would be granted now. Stock is untouched.
pub async fn recommend(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReliefRequest>,
) -> axum::response::Response {
    let top_k = match body.checked_top_k() {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.planner.preview(&body.query, top_k).await {
        Ok((rec, validation)) => Json(dto::merge([
            dto::recommendation_json(&rec),
            dto::validation_json(&validation),
        ]))
        .into_response(),
        Err(e) => errors::planner_error_to_response(e),
    }
}

pub async fn allocate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReliefRequest>,
) -> axum::response::Response {
    let top_k = match body.checked_top_k() {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.planner.allocate(&body.query, top_k).await {
        Ok((rec, committed)) => Json(dto::merge([
            dto::recommendation_json(&rec),
            dto::committed_json(&committed),
        ]))
        .into_response(),
        Err(e) => errors::planner_error_to_response(e),
    }
}

/// Commit an operator-supplied candidate map through the same validator.
pub async fn commit(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CommitRequest>,
) -> axum::response::Response {
    let candidate = AllocationCandidate::from_json_object(&body.allocations);
    match services.planner.commit(candidate).await {
        Ok(committed) => Json(dto::committed_json(&committed)).into_response(),
        Err(e) => errors::planner_error_to_response(e),
    }
}
