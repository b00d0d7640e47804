//! Infrastructure layer: configuration, retrieval, model client, snapshot
//! persistence, cluster reports, and the single-writer allocation pipeline.

pub mod clusters;
pub mod config;
pub mod dispatcher;
pub mod embedder;
pub mod llm;
pub mod planner;
pub mod semantic_index;
pub mod snapshot;

pub use clusters::{ClusterError, load_cluster_reports, read_cluster_reports};
pub use config::{AppConfig, ConfigError, LlmConfig};
pub use dispatcher::{AllocationDispatcher, BootstrapError, CommitError, CommittedAllocation};
pub use embedder::{DEFAULT_EMBEDDING_MODEL, EMBEDDING_DIM, SentenceEmbedder};
pub use llm::{DisabledLlm, HuggingFaceClient, LlmClient, LlmError, client_from_config};
pub use planner::{PlanDraft, PlannerError, PlannerSettings, Recommendation, RecommendationSource, ReliefPlanner};
#[cfg(any(test, feature = "test-util"))]
pub use semantic_index::HashingEmbedder;
pub use semantic_index::{Embedder, FlatL2Index, IndexError, IndexHit, SemanticIndex};
pub use snapshot::{InMemorySnapshotStore, JsonFileSnapshotStore, SnapshotError, SnapshotStore};
