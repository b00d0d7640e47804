use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use relief_ai::ClusterReport;
use relief_infra::{
    AllocationDispatcher, AppConfig, BootstrapError, ClusterError, CommitError, Embedder, FlatL2Index, InMemorySnapshotStore,
    IndexError, JsonFileSnapshotStore, LlmClient, LlmError, PlannerSettings, ReliefPlanner, SentenceEmbedder, SnapshotStore,
    client_from_config, load_cluster_reports,
};

/// Type-erased snapshot store so file-backed and in-memory wiring share one planner type.
pub type DynSnapshotStore = Arc<dyn SnapshotStore>;

pub type Planner = ReliefPlanner<DynSnapshotStore>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to load ledger: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("failed to build semantic index: {0}")]
    Index(#[from] IndexError),

    #[error("failed to build model client: {0}")]
    Llm(#[from] LlmError),

    #[error("failed to load cluster reports: {0}")]
    Clusters(#[from] ClusterError),

    #[error(transparent)]
    Ledger(#[from] CommitError),
}

pub struct AppServices {
    pub planner: Planner,
    pub default_top_k: usize,
    /// Drone cluster reports, loaded once at startup. Empty when no file is configured.
    pub clusters: Vec<ClusterReport>,
}

impl AppServices {
    pub fn dispatcher(&self) -> &AllocationDispatcher<DynSnapshotStore> {
        self.planner.dispatcher()
    }
}

/// Wire services from configuration: configured model endpoint and the
/// sentence-transformer named by `embedding_model`. Blocks while the
/// embedding model loads.
pub fn build_services(config: &AppConfig) -> Result<AppServices, ServiceError> {
    let llm: Arc<dyn LlmClient> = Arc::from(client_from_config(&config.llm)?);
    let embedder: Arc<dyn Embedder> = Arc::new(SentenceEmbedder::from_hub(&config.embedding_model)?);
    build_services_with(config, llm, embedder)
}

/// Same as [`build_services`] with an injected model client and embedder.
pub fn build_services_with(
    config: &AppConfig,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
) -> Result<AppServices, ServiceError> {
    let store: DynSnapshotStore = match &config.snapshot_path {
        Some(path) => {
            info!(path = %path.display(), "using file snapshot store");
            Arc::new(JsonFileSnapshotStore::new(path))
        }
        None => {
            info!("RELIEF_SNAPSHOT_PATH not set; ledger snapshots stay in memory");
            Arc::new(InMemorySnapshotStore::new())
        }
    };

    let dispatcher = Arc::new(AllocationDispatcher::bootstrap(store, config.match_policy)?);

    // Item names never change after startup, so the index is built once.
    let index = dispatcher.read(|ledger| FlatL2Index::build(embedder, ledger))??;

    let clusters = match &config.clusters_path {
        Some(path) => load_cluster_reports(path)?,
        None => {
            info!("RELIEF_CLUSTERS_PATH not set; cluster recommendations will be empty");
            Vec::new()
        }
    };

    info!(model = llm.name(), top_k = config.top_k, clusters = clusters.len(), "relief services ready");

    let planner = ReliefPlanner::new(
        dispatcher,
        Arc::new(index),
        llm,
        PlannerSettings {
            top_k: config.top_k,
            llm_timeout: config.llm.timeout,
        },
    );

    Ok(AppServices {
        planner,
        default_top_k: config.top_k,
        clusters,
    })
}
