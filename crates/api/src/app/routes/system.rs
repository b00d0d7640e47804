use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::{errors, services::AppServices};

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.dispatcher().read(|ledger| ledger.len()) {
        Ok(items) => Json(serde_json::json!({ "status": "ok", "items": items })).into_response(),
        Err(e) => errors::json_error(StatusCode::SERVICE_UNAVAILABLE, "ledger_unavailable", e.to_string()),
    }
}
