//! Strict schema for a full relief plan.
//!
//! Unlike [`crate::parser`], nothing here is best-effort: unknown keys, wrong
//! types and out-of-range values are rejected and reported, never coerced.
//! `route` and `eta_minutes` are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemQty {
    pub item: String,
    pub qty: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraint {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_load: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutePoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanAllocation {
    pub cluster_id: String,
    pub priority: f64,
    pub items: Vec<ItemQty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<RoutePoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Attribution {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub objective: String,
    pub assumptions: Vec<String>,
    pub constraints: Vec<Constraint>,
    pub allocations: Vec<PlanAllocation>,
    pub unmet_demand: Vec<ItemQty>,
    pub source_attributions: Vec<Attribution>,
    pub summary: String,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no JSON object found in plan text")]
    NoJsonObject,

    #[error("plan JSON failed schema validation: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("invalid value at {path}: {message}")]
    InvalidField { path: String, message: String },
}

impl PlanError {
    fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validate model text that should contain a plan object (surrounding prose is tolerated).
pub fn validate_plan_json(raw_text: &str) -> Result<Plan, PlanError> {
    let start = raw_text.find('{').ok_or(PlanError::NoJsonObject)?;
    let end = raw_text.rfind('}').ok_or(PlanError::NoJsonObject)?;
    if end < start {
        return Err(PlanError::NoJsonObject);
    }
    let plan: Plan = serde_json::from_str(&raw_text[start..=end])?;
    check_plan(&plan)?;
    Ok(plan)
}

/// Validate an already-decoded JSON value.
pub fn validate_plan_value(value: JsonValue) -> Result<Plan, PlanError> {
    let plan: Plan = serde_json::from_value(value)?;
    check_plan(&plan)?;
    Ok(plan)
}

fn check_plan(plan: &Plan) -> Result<(), PlanError> {
    for (i, alloc) in plan.allocations.iter().enumerate() {
        if alloc.cluster_id.trim().is_empty() {
            return Err(PlanError::field(format!("allocations[{i}].cluster_id"), "must not be empty"));
        }
        if !alloc.priority.is_finite() || !(0.0..=1.0).contains(&alloc.priority) {
            return Err(PlanError::field(
                format!("allocations[{i}].priority"),
                format!("{} is outside [0, 1]", alloc.priority),
            ));
        }
        for (j, item) in alloc.items.iter().enumerate() {
            if item.item.trim().is_empty() {
                return Err(PlanError::field(format!("allocations[{i}].items[{j}].item"), "must not be empty"));
            }
        }
    }
    for (j, item) in plan.unmet_demand.iter().enumerate() {
        if item.item.trim().is_empty() {
            return Err(PlanError::field(format!("unmet_demand[{j}].item"), "must not be empty"));
        }
    }
    Ok(())
}
