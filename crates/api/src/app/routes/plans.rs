use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::Value as JsonValue;

use relief_ai::validate_plan_value;

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/validate", post(validate))
        .route("/prompt", post(prompt))
        .route("/draft", post(draft))
}

/// Strict schema check; malformed plans are reported, never repaired.
pub async fn validate(Json(body): Json<JsonValue>) -> axum::response::Response {
    match validate_plan_value(body) {
        Ok(plan) => Json(serde_json::json!({ "valid": true, "plan": plan })).into_response(),
        Err(e) => errors::json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_plan", e.to_string()),
    }
}

/// Render the planner prompt over live stock without calling the model.
pub async fn prompt(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PlanRequest>,
) -> axum::response::Response {
    match services
        .planner
        .plan_prompt(&body.query, body.time_window.as_deref(), &body.context)
    {
        Ok(prompt) => Json(prompt).into_response(),
        Err(e) => errors::planner_error_to_response(e),
    }
}

/// Ask the model for a plan; only a plan that passes validation is returned.
pub async fn draft(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PlanRequest>,
) -> axum::response::Response {
    match services
        .planner
        .draft_plan(&body.query, body.time_window.as_deref(), &body.context)
        .await
    {
        Ok(draft) => Json(draft).into_response(),
        Err(e) => errors::planner_error_to_response(e),
    }
}
