use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use relief_ai::AiError;
use relief_infra::{CommitError, PlannerError};

use crate::app::dto;

pub fn planner_error_to_response(err: PlannerError) -> axum::response::Response {
    match err {
        PlannerError::Ai(AiError::InvalidInput(msg)) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        PlannerError::Ai(e @ AiError::Plan(_)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_plan", e.to_string())
        }
        PlannerError::Ai(e @ AiError::Render(_)) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string())
        }
        PlannerError::Index(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "index_error", e.to_string()),
        PlannerError::Commit(e) => commit_error_to_response(e),
        PlannerError::ModelUnavailable(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, "model_unavailable", msg),
        PlannerError::Worker(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string()),
    }
}

/// A failed persist still reports the applied log: the stock has already moved.
pub fn commit_error_to_response(err: CommitError) -> axum::response::Response {
    match err {
        CommitError::Persist { log, source } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "persist_failed",
                "message": format!("allocation applied but snapshot persistence failed: {source}"),
                "log": dto::log_json(&log),
            })),
        )
            .into_response(),
        CommitError::Snapshot(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "snapshot_error", e.to_string()),
        CommitError::Unavailable(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, "ledger_unavailable", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
