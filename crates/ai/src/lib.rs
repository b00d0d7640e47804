//! `relief-ai`
//!
//! **Responsibility:** the text-in, numbers-out side of relief allocation.
//!
//! - Estimates per-item needs from a situation description.
//! - Renders the recommendation prompt and decodes whatever the model returns.
//! - Renders the plan prompt and validates full plan objects against a strict schema.
//! - Ranks drone-reported field clusters and sizes their rations.
//!
//! This crate never touches the ledger; it only sees the projections in
//! `relief-core`.

pub mod error;
pub mod estimator;
pub mod parser;
pub mod plan;
pub mod prompt;
pub mod triage;

pub use error::{AiError, AiResult, require_query};
pub use estimator::{
    BASELINE_RATES, BaselineRate, CONTEXT_RULES, ContextRule, DEFAULT_POPULATION, Population, PopulationSource,
    RequirementEstimator,
};
pub use parser::{DecodeStage, ParsedRecommendation, RecommendationParser};
pub use plan::{Attribution, Constraint, ItemQty, Plan, PlanAllocation, PlanError, RoutePoint, validate_plan_json, validate_plan_value};
pub use prompt::{
    ContextDocument, DEFAULT_TIME_WINDOW, MAX_CONTEXT_BLOCKS, PlannerPrompt, enhanced_query, plan_schema_example,
    planner_prompt, recommendation_prompt,
};
pub use triage::{
    CLUSTER_RATIONS, ClusterFilter, ClusterReport, DEFAULT_CLUSTER_LIMIT, DEFAULT_MAX_DISTANCE_KM, RankedCluster, Ration,
    cluster_resources, rank_clusters,
};
