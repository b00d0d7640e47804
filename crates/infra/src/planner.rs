//! End-to-end relief recommendation: retrieve, estimate, ask the model, decode,
//! and (for `allocate`) commit through the dispatcher. Also drafts full plans.
//!
//! Only the final commit takes the ledger's write lock. Retrieval reads the
//! ledger under a shared lock, and the model call holds no lock at all.
//! Embedding and commits block (model forward pass, snapshot fsync), so both
//! run on tokio's blocking pool.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use relief_ai::{
    AiError, ContextDocument, DecodeStage, Plan, PlannerPrompt, Population, RecommendationParser, RequirementEstimator,
    enhanced_query, planner_prompt, recommendation_prompt, require_query, validate_plan_json,
};
use relief_core::{AllocationCandidate, RequirementEstimate, RetrievedCandidate};
use relief_inventory::Validation;

use crate::dispatcher::{AllocationDispatcher, CommitError, CommittedAllocation};
use crate::llm::{LlmClient, LlmError};
use crate::semantic_index::{IndexError, SemanticIndex, candidates_from_hits};
use crate::snapshot::SnapshotStore;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("background task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Where the allocation candidate came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Model,
    Estimate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub query: String,
    pub retrieved: Vec<RetrievedCandidate>,
    pub population: Population,
    pub estimated_needs: RequirementEstimate,
    pub recommendation_source: RecommendationSource,
    /// Decoder stage that produced the model candidate; `None` for the estimate fallback.
    pub decode_stage: Option<DecodeStage>,
    pub candidate: AllocationCandidate,
}

/// A model-drafted plan that passed strict validation, with the prompt that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDraft {
    pub prompt: PlannerPrompt,
    pub plan: Plan,
}

#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub top_k: usize,
    pub llm_timeout: Duration,
}

pub struct ReliefPlanner<S> {
    dispatcher: Arc<AllocationDispatcher<S>>,
    index: Arc<dyn SemanticIndex>,
    llm: Arc<dyn LlmClient>,
    estimator: RequirementEstimator,
    parser: RecommendationParser,
    settings: PlannerSettings,
}

impl<S: SnapshotStore + 'static> ReliefPlanner<S> {
    pub fn new(
        dispatcher: Arc<AllocationDispatcher<S>>,
        index: Arc<dyn SemanticIndex>,
        llm: Arc<dyn LlmClient>,
        settings: PlannerSettings,
    ) -> Self {
        Self {
            dispatcher,
            index,
            llm,
            estimator: RequirementEstimator::new(),
            parser: RecommendationParser::new(),
            settings,
        }
    }

    pub fn dispatcher(&self) -> &Arc<AllocationDispatcher<S>> {
        &self.dispatcher
    }

    /// Nearest items for `query` with live stock, at most `top_k`.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedCandidate>, PlannerError> {
        let index = Arc::clone(&self.index);
        let dispatcher = Arc::clone(&self.dispatcher);
        let enhanced = enhanced_query(query);
        run_blocking(move || {
            let hits = index.search(&enhanced, top_k)?;
            Ok(dispatcher.read(|ledger| candidates_from_hits(ledger, &hits))?)
        })
        .await
    }

    /// Build a recommendation without touching stock.
    pub async fn recommend(&self, query: &str, top_k: Option<usize>) -> Result<Recommendation, PlannerError> {
        let query = require_query(query)?;
        let retrieved = self.retrieve(query, top_k.unwrap_or(self.settings.top_k)).await?;

        let population = self.estimator.population(query);
        let estimated_needs = self.estimator.estimate_for(query, population.count, &retrieved);
        debug!(
            population = population.count,
            retrieved = retrieved.len(),
            estimated = estimated_needs.len(),
            "requirements estimated"
        );

        let from_model = if retrieved.is_empty() {
            None
        } else {
            self.ask_model(query, &retrieved, &estimated_needs).await
        };

        let (recommendation_source, decode_stage, candidate) = match from_model {
            Some((stage, candidate)) => (RecommendationSource::Model, Some(stage), candidate),
            None => (
                RecommendationSource::Estimate,
                None,
                AllocationCandidate::from_estimate(&estimated_needs),
            ),
        };

        Ok(Recommendation {
            query: query.to_string(),
            retrieved,
            population,
            estimated_needs,
            recommendation_source,
            decode_stage,
            candidate,
        })
    }

    /// Recommendation plus the grants it would receive right now.
    pub async fn preview(&self, query: &str, top_k: Option<usize>) -> Result<(Recommendation, Validation), PlannerError> {
        let recommendation = self.recommend(query, top_k).await?;
        let validation = self.dispatcher.preview(&recommendation.candidate)?;
        Ok((recommendation, validation))
    }

    /// Full pipeline, ending in a committed and persisted allocation.
    pub async fn allocate(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<(Recommendation, CommittedAllocation), PlannerError> {
        let recommendation = self.recommend(query, top_k).await?;
        let committed = self.commit(recommendation.candidate.clone()).await?;
        info!(
            source = ?recommendation.recommendation_source,
            items = committed.log.items_allocated(),
            units = committed.log.total_units(),
            "relief allocation completed"
        );
        Ok((recommendation, committed))
    }

    /// Commit a candidate through the dispatcher on the blocking pool.
    pub async fn commit(&self, candidate: AllocationCandidate) -> Result<CommittedAllocation, PlannerError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        run_blocking(move || Ok(dispatcher.commit(&candidate)?)).await
    }

    /// Plan prompts over the current stock levels.
    pub fn plan_prompt(
        &self,
        query: &str,
        time_window: Option<&str>,
        context: &[ContextDocument],
    ) -> Result<PlannerPrompt, PlannerError> {
        let stock: Vec<(String, u64)> = self.dispatcher.read(|ledger| {
            ledger
                .items()
                .iter()
                .map(|item| (item.name().to_string(), item.quantity()))
                .collect()
        })?;
        Ok(planner_prompt(
            query,
            time_window,
            stock.iter().map(|(name, qty)| (name.as_str(), *qty)),
            context,
        )?)
    }

    /// Ask the model for a full plan over live stock and `context`, then validate it strictly.
    ///
    /// Unlike recommendations there is no deterministic fallback: a disabled or
    /// failing model is an error, and so is a plan that fails the schema.
    pub async fn draft_plan(
        &self,
        query: &str,
        time_window: Option<&str>,
        context: &[ContextDocument],
    ) -> Result<PlanDraft, PlannerError> {
        let prompt = self.plan_prompt(query, time_window, context)?;

        let combined = prompt.combined();
        let text = match tokio::time::timeout(self.settings.llm_timeout, self.llm.generate(&combined)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(PlannerError::ModelUnavailable(e.to_string())),
            Err(_) => {
                return Err(PlannerError::ModelUnavailable(format!(
                    "no response within {}s",
                    self.settings.llm_timeout.as_secs_f32()
                )));
            }
        };

        // Drop an echoed prompt so the schema example inside it is not mistaken for the answer.
        let answer = text.strip_prefix(combined.as_str()).unwrap_or(&text);
        let plan = validate_plan_json(answer).map_err(AiError::from)?;
        info!(
            model = self.llm.name(),
            allocations = plan.allocations.len(),
            "plan drafted"
        );
        Ok(PlanDraft { prompt, plan })
    }

    /// `None` means "use the estimate": model disabled, failed, timed out, or said nothing usable.
    async fn ask_model(
        &self,
        query: &str,
        retrieved: &[RetrievedCandidate],
        estimate: &RequirementEstimate,
    ) -> Option<(DecodeStage, AllocationCandidate)> {
        let prompt = recommendation_prompt(query, retrieved, estimate);

        let text = match tokio::time::timeout(self.settings.llm_timeout, self.llm.generate(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(LlmError::Disabled)) => {
                debug!("model disabled; using estimate");
                return None;
            }
            Ok(Err(e)) => {
                warn!(model = self.llm.name(), error = %e, "model call failed; falling back to estimate");
                return None;
            }
            Err(_) => {
                warn!(
                    model = self.llm.name(),
                    timeout_secs = self.settings.llm_timeout.as_secs_f32(),
                    "model call timed out; falling back to estimate"
                );
                return None;
            }
        };

        let parsed = self.parser.parse(&text, &prompt);
        if parsed.candidate.is_empty() {
            warn!(model = self.llm.name(), "model output unusable; falling back to estimate");
            return None;
        }
        Some((parsed.stage, parsed.candidate))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, PlannerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PlannerError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use relief_inventory::{AllocationOutcome, InventoryLedger};

    use crate::llm::DisabledLlm;
    use crate::semantic_index::{FlatL2Index, HashingEmbedder};
    use crate::snapshot::InMemorySnapshotStore;

    struct ScriptedLlm(&'static str);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            // Echo the prompt the way hosted text-generation endpoints do.
            Ok(format!("{prompt} {}", self.0))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct SlowLlm;

    #[async_trait]
    impl LlmClient for SlowLlm {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(r#"{"Tents": 1}"#.to_string())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn planner(llm: Arc<dyn LlmClient>) -> ReliefPlanner<InMemorySnapshotStore> {
        let ledger = InventoryLedger::relief_defaults();
        let index = FlatL2Index::build(HashingEmbedder::default(), &ledger).unwrap();
        let dispatcher = Arc::new(AllocationDispatcher::new(ledger, InMemorySnapshotStore::new()));
        ReliefPlanner::new(
            dispatcher,
            Arc::new(index),
            llm,
            PlannerSettings {
                top_k: 10,
                llm_timeout: Duration::from_millis(50),
            },
        )
    }

    fn stock(planner: &ReliefPlanner<InMemorySnapshotStore>, name: &str) -> u64 {
        planner
            .dispatcher()
            .read(|l| l.get(name).map(|i| i.quantity()).unwrap_or(0))
            .unwrap()
    }

    #[tokio::test]
    async fn disabled_model_falls_back_to_estimate() {
        let p = planner(Arc::new(DisabledLlm));
        let (rec, validation) = p.preview("45 people suffering from injuries and dehydration", None).await.unwrap();

        assert_eq!(rec.recommendation_source, RecommendationSource::Estimate);
        assert_eq!(rec.population.count, 45);
        assert_eq!(rec.estimated_needs.get("Water Bottles"), Some(202));
        assert_eq!(validation.allocation.granted("Water Bottles"), Some(202));
        // Preview leaves stock alone.
        assert_eq!(stock(&p, "Water Bottles"), 300);
    }

    #[tokio::test]
    async fn model_recommendation_is_used_and_committed() {
        let p = planner(Arc::new(ScriptedLlm(r#"{"Medical Kit": 5, "bandages": 40, "Jetpack": 2}"#)));
        let (rec, committed) = p.allocate("20 injured people", None).await.unwrap();

        assert_eq!(rec.recommendation_source, RecommendationSource::Model);
        assert_eq!(rec.decode_stage, Some(DecodeStage::Strict));
        assert_eq!(stock(&p, "Medical Kit"), 45);
        assert_eq!(stock(&p, "First Aid Bandages"), 460);
        assert_eq!(committed.allocation.granted("First Aid Bandages"), Some(40));
        assert!(
            committed
                .log
                .records()
                .iter()
                .any(|r| r.item == "Jetpack" && r.outcome == AllocationOutcome::RejectedUnknownItem)
        );
    }

    #[tokio::test]
    async fn unusable_model_output_falls_back_to_estimate() {
        let p = planner(Arc::new(ScriptedLlm("I am unable to help with that.")));
        let rec = p.recommend("flood, 10 people", None).await.unwrap();
        assert_eq!(rec.recommendation_source, RecommendationSource::Estimate);
        assert_eq!(rec.candidate, AllocationCandidate::from_estimate(&rec.estimated_needs));
    }

    #[tokio::test]
    async fn slow_model_times_out_to_estimate() {
        let p = planner(Arc::new(SlowLlm));
        let rec = p.recommend("12 survivors need blankets", None).await.unwrap();
        assert_eq!(rec.recommendation_source, RecommendationSource::Estimate);
    }

    #[tokio::test]
    async fn top_k_limits_retrieval() {
        let p = planner(Arc::new(DisabledLlm));
        let rec = p.recommend("water for 5 people", Some(3)).await.unwrap();
        assert_eq!(rec.retrieved.len(), 3);
        assert!(rec.estimated_needs.len() <= 3);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let p = planner(Arc::new(DisabledLlm));
        assert!(matches!(p.recommend("  ", None).await, Err(PlannerError::Ai(_))));
    }

    #[tokio::test]
    async fn empty_inventory_recommends_nothing() {
        let ledger = InventoryLedger::new(Vec::new()).unwrap();
        let index = FlatL2Index::build(HashingEmbedder::default(), &ledger).unwrap();
        let p = ReliefPlanner::new(
            Arc::new(AllocationDispatcher::new(ledger, InMemorySnapshotStore::new())),
            Arc::new(index),
            Arc::new(ScriptedLlm(r#"{"Tents": 3}"#)),
            PlannerSettings {
                top_k: 5,
                llm_timeout: Duration::from_millis(50),
            },
        );

        let (rec, committed) = p.allocate("100 people", None).await.unwrap();
        assert!(rec.retrieved.is_empty());
        assert!(rec.candidate.is_empty());
        assert!(committed.allocation.is_empty());
        assert!(committed.log.records().is_empty());
    }

    const PLAN: &str = r#"{
        "objective": "Deliver urgent relief",
        "assumptions": [],
        "constraints": [{"type": "time", "max_minutes": 360}],
        "allocations": [{"cluster_id": "C001", "priority": 0.9, "items": [{"item": "Water Bottles", "qty": 50}]}],
        "unmet_demand": [],
        "source_attributions": [{"source": "report:RP1022"}],
        "summary": "Water to C001."
    }"#;

    fn context() -> Vec<ContextDocument> {
        vec![ContextDocument {
            id: Some("RP1022".to_string()),
            index: Some("report".to_string()),
            created_at: None,
            text: "20 people stranded on rooftops near the river.".to_string(),
        }]
    }

    #[tokio::test]
    async fn drafted_plan_is_validated_and_prompt_lists_live_stock() {
        let p = planner(Arc::new(ScriptedLlm(PLAN)));
        p.commit(candidate_of(&[("Tents", 5)])).await.unwrap();

        let draft = p.draft_plan("6-hour flood plan", None, &context()).await.unwrap();
        assert_eq!(draft.plan.allocations[0].cluster_id, "C001");
        assert!(draft.prompt.user.contains("Tents,20\n"));
        assert!(draft.prompt.user.contains("[id=RP1022]"));
    }

    #[tokio::test]
    async fn drafting_without_a_model_is_an_error() {
        let p = planner(Arc::new(DisabledLlm));
        let err = p.draft_plan("6-hour flood plan", None, &[]).await.unwrap_err();
        assert!(matches!(err, PlannerError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn drafted_plan_failing_the_schema_is_rejected() {
        let p = planner(Arc::new(ScriptedLlm(r#"{"objective": "x", "confidence": 0.3}"#)));
        let err = p.draft_plan("6-hour flood plan", Some("next 2 hours"), &[]).await.unwrap_err();
        assert!(matches!(err, PlannerError::Ai(AiError::Plan(_))));
    }

    #[tokio::test]
    async fn operator_commit_returns_grants_and_log() {
        let p = planner(Arc::new(DisabledLlm));
        let committed = p.commit(candidate_of(&[("water", 120), ("Tents", 0)])).await.unwrap();
        assert_eq!(committed.allocation.granted("Water Bottles"), Some(120));
        assert_eq!(committed.log.total_units(), 120);
        assert_eq!(stock(&p, "Water Bottles"), 180);
    }

    fn candidate_of(pairs: &[(&str, i64)]) -> AllocationCandidate {
        pairs.iter().map(|(n, q)| (n.to_string(), *q)).collect()
    }

    #[tokio::test]
    #[ignore] // Requires model download
    async fn default_top_k_retrieves_water_and_medical_for_injury_query() {
        use crate::embedder::{DEFAULT_EMBEDDING_MODEL, SentenceEmbedder};
        use crate::config::DEFAULT_TOP_K;

        let ledger = InventoryLedger::relief_defaults();
        let embedder = SentenceEmbedder::from_hub(DEFAULT_EMBEDDING_MODEL).expect("load model");
        let index = FlatL2Index::build(embedder, &ledger).unwrap();
        let p = ReliefPlanner::new(
            Arc::new(AllocationDispatcher::new(ledger, InMemorySnapshotStore::new())),
            Arc::new(index),
            Arc::new(DisabledLlm),
            PlannerSettings {
                top_k: DEFAULT_TOP_K,
                llm_timeout: Duration::from_millis(50),
            },
        );

        let rec = p
            .recommend("45 people suffering from injuries and dehydration", None)
            .await
            .unwrap();
        let names: Vec<&str> = rec.retrieved.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), DEFAULT_TOP_K);
        assert!(names.contains(&"Water Bottles"), "retrieved {names:?}");
        assert!(names.contains(&"Medical Kit"), "retrieved {names:?}");
        assert_eq!(rec.estimated_needs.get("Water Bottles"), Some(202));
        assert_eq!(rec.estimated_needs.get("Medical Kit"), Some(13));
    }
}
