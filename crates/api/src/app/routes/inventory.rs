use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use relief_inventory::StockStatus;

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_summary))
        .route("/items/:name", get(get_item))
}

pub async fn get_summary(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.dispatcher().read(|ledger| ledger.summary()) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::commit_error_to_response(e),
    }
}

/// Exact (case-insensitive) lookup; fuzzy matching is reserved for allocation.
pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    let found = services.dispatcher().read(|ledger| {
        ledger
            .get(&name)
            .map(|item| (item.clone(), ledger.baseline(item.id())))
    });

    match found {
        Ok(Some((item, baseline))) => Json(serde_json::json!({
            "id": item.id(),
            "name": item.name(),
            "quantity": item.quantity(),
            "category": item.category(),
            "priority": item.priority(),
            "baseline": baseline,
            "used": baseline.saturating_sub(item.quantity()),
            "status": StockStatus::for_quantity(item.quantity()),
        }))
        .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("no inventory item named '{name}'")),
        Err(e) => errors::commit_error_to_response(e),
    }
}
