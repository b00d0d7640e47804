use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};

use relief_ai::{ClusterFilter, ContextDocument, DEFAULT_CLUSTER_LIMIT, DEFAULT_MAX_DISTANCE_KM};
use relief_infra::{CommittedAllocation, Recommendation};
use relief_inventory::{AllocationLog, Validation};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ReliefRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl ReliefRequest {
    pub fn checked_top_k(&self) -> Result<Option<usize>, axum::response::Response> {
        match self.top_k {
            Some(0) => Err(errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "validation_error",
                "top_k must be positive",
            )),
            other => Ok(other),
        }
    }
}

/// Operator-supplied allocation: `{"allocations": {"<item>": <qty>, ...}}`.
#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub allocations: Map<String, JsonValue>,
}

/// `GET /clusters/recommendations` query string.
#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    #[serde(default)]
    pub min_people: u64,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    #[serde(default = "default_cluster_limit")]
    pub limit: usize,
}

fn default_max_distance() -> f64 {
    DEFAULT_MAX_DISTANCE_KM
}

fn default_cluster_limit() -> usize {
    DEFAULT_CLUSTER_LIMIT
}

impl From<ClusterQuery> for ClusterFilter {
    fn from(q: ClusterQuery) -> Self {
        ClusterFilter {
            min_people: q.min_people,
            max_distance_km: q.max_distance,
            limit: q.limit,
        }
    }
}

/// Body for `/plans/prompt` and `/plans/draft`.
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub query: String,
    #[serde(default)]
    pub time_window: Option<String>,
    #[serde(default)]
    pub context: Vec<ContextDocument>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn recommendation_json(rec: &Recommendation) -> JsonValue {
    json!({
        "query": rec.query,
        "retrieved": rec.retrieved,
        "population": rec.population,
        "estimated_needs": rec.estimated_needs,
        "recommendation_source": rec.recommendation_source,
        "decode_stage": rec.decode_stage,
    })
}

pub fn validation_json(validation: &Validation) -> JsonValue {
    json!({
        "validated_allocation": validation.allocation,
        "rejections": validation.rejections,
    })
}

/// What was granted plus the audit log for it.
pub fn committed_json(committed: &CommittedAllocation) -> JsonValue {
    json!({
        "validated_allocation": committed.allocation,
        "log": log_json(&committed.log),
    })
}

pub fn log_json(log: &AllocationLog) -> JsonValue {
    json!({
        "run_id": log.run_id,
        "committed_at": log.committed_at,
        "records": log.records(),
        "items_allocated": log.items_allocated(),
        "total_units": log.total_units(),
        "audit": log.render(),
    })
}

/// Shallow merge of JSON objects; later keys win.
pub fn merge(parts: impl IntoIterator<Item = JsonValue>) -> JsonValue {
    let mut out = Map::new();
    for part in parts {
        if let JsonValue::Object(map) = part {
            out.extend(map);
        }
    }
    JsonValue::Object(out)
}
