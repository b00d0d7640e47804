//! Prompt text for the recommendation model, the plan model and the retrieval query.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::json;

use relief_core::{RequirementEstimate, RetrievedCandidate};

use crate::error::{AiError, AiResult, require_query};

pub const DEFAULT_TIME_WINDOW: &str = "last 6 hours";

/// Context documents beyond this are left out of the plan prompt.
pub const MAX_CONTEXT_BLOCKS: usize = 10;

/// Query text actually embedded for retrieval.
pub fn enhanced_query(query: &str) -> String {
    format!("disaster relief emergency: {}", query.trim())
}

/// Build the instruction prompt handed to the language model.
///
/// Each retrieved item is listed with its live stock and estimated need
/// (0 when the estimator had no rate for it).
pub fn recommendation_prompt(query: &str, candidates: &[RetrievedCandidate], estimate: &RequirementEstimate) -> String {
    let mut context = String::new();
    for c in candidates {
        let need = estimate.get(&c.name).unwrap_or(0);
        let _ = writeln!(context, "- {} (Available: {}, Estimated Need: {})", c.name, c.quantity, need);
    }
    if context.is_empty() {
        context.push_str("No items available\n");
    }

    let mut needs = String::new();
    if !estimate.is_empty() {
        needs.push_str("ESTIMATED NEEDS:\n");
        for (item, qty) in estimate.iter() {
            let _ = writeln!(needs, "- {item}: {qty}");
        }
    }

    format!(
        "You are an expert disaster relief coordinator.

SITUATION: {query}

AVAILABLE INVENTORY:
{context}
{needs}
INSTRUCTIONS:
1. Recommend ONLY from available inventory items listed above.
2. Use exact item names from the inventory.
3. Consider estimated needs but don't exceed available stock.
4. Allocate the minimum of estimated need and available stock.
5. Priorities: Medical > Water > Food > Shelter > Equipment.
6. Return ONLY a valid JSON object with item names as keys and quantities as values.

Example format: {{\"Medical Kit\": 5, \"Water Bottles\": 30}}

RECOMMENDATION:",
        query = query.trim(),
    )
}

/// A retrieved situation report handed to the plan model as evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannerPrompt {
    pub system: String,
    pub user: String,
}

impl PlannerPrompt {
    /// Single-string form for text-generation endpoints without chat roles.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.system.trim_end(), self.user)
    }
}

/// Shape example embedded in the plan system prompt; it must itself be a valid plan.
pub fn plan_schema_example() -> serde_json::Value {
    json!({
        "objective": "string",
        "assumptions": ["string"],
        "constraints": [{"type": "time", "max_minutes": 120}],
        "allocations": [{
            "cluster_id": "C017",
            "priority": 0.92,
            "items": [{"item": "Water Bottles", "qty": 120}],
            "assigned_team": "BoatTeam-2",
            "route": [{"lat": 18.523, "lon": 73.84}],
            "eta_minutes": 35
        }],
        "unmet_demand": [{"item": "Blankets", "qty": 40}],
        "source_attributions": [{"source": "report:RP1022", "timestamp": "2025-08-18T12:30:00Z"}],
        "summary": "string"
    })
}

fn plan_system_prompt() -> String {
    format!(
        "You are the Flood Relief Planner. You MUST:
1) Use ONLY the provided context documents and inventory snapshot.
2) Return VALID JSON that conforms to the schema below. Do not add extra keys. Do not write any prose outside JSON.
3) Prioritize clusters by vulnerability (children/elderly/injured) and urgency. Respect reachability and stock limits.
4) If any critical info is missing, set fields conservatively and list an assumption.

JSON schema (shape example):
{}
",
        plan_schema_example()
    )
}

fn inventory_csv<'a>(rows: impl IntoIterator<Item = (&'a str, u64)>) -> AiResult<String> {
    let render = |e: &dyn std::fmt::Display| AiError::Render(format!("inventory csv: {e}"));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Resource", "Quantity"]).map_err(|e| render(&e))?;
    for (name, qty) in rows {
        let qty = qty.to_string();
        writer.write_record([name, qty.as_str()]).map_err(|e| render(&e))?;
    }
    let bytes = writer.into_inner().map_err(|e| render(&e))?;
    String::from_utf8(bytes).map_err(|e| render(&e))
}

fn context_blocks(docs: &[ContextDocument]) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
    docs.iter()
        .take(MAX_CONTEXT_BLOCKS)
        .map(|d| {
            format!(
                "[id={}] [index={}] [created_at={}]\n{}",
                field(&d.id),
                field(&d.index),
                field(&d.created_at),
                d.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System and user prompts asking the model for a full [`crate::Plan`].
///
/// `inventory` is the live stock as `(name, quantity)` rows.
pub fn planner_prompt<'a>(
    query: &str,
    time_window: Option<&str>,
    inventory: impl IntoIterator<Item = (&'a str, u64)>,
    context: &[ContextDocument],
) -> AiResult<PlannerPrompt> {
    let query = require_query(query)?;
    let time_window = time_window
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .unwrap_or(DEFAULT_TIME_WINDOW);

    let user = format!(
        "
Query: {query}

Time window: {time_window}

Inventory snapshot (CSV rows):
{inventory}
Top-K retrieved context (include meta.id/index/created_at):
{context}
",
        inventory = inventory_csv(inventory)?,
        context = context_blocks(context),
    );

    Ok(PlannerPrompt {
        system: plan_system_prompt(),
        user,
    })
}
