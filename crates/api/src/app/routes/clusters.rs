use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use relief_ai::{ClusterFilter, rank_clusters};

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/recommendations", get(recommendations))
}

/// Rank the loaded drone clusters; each entry carries its ration estimate.
pub async fn recommendations(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ClusterQuery>,
) -> axum::response::Response {
    match rank_clusters(&services.clusters, &ClusterFilter::from(query)) {
        Ok(ranked) => Json(serde_json::json!({ "recommendations": ranked })).into_response(),
        Err(e) => errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    }
}
