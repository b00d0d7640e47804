//! Process configuration, read once at startup from `RELIEF_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use relief_inventory::MatchPolicy;

use crate::embedder::DEFAULT_EMBEDDING_MODEL;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_LLM_URL: &str =
    "https://api-inference.huggingface.co/models/meta-llama/Meta-Llama-3-8B-Instruct";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Model endpoint settings. A missing token disables the model entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn enabled(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` keeps the ledger snapshot in memory only.
    pub snapshot_path: Option<PathBuf>,
    pub llm: LlmConfig,
    pub top_k: usize,
    pub match_policy: MatchPolicy,
    /// Hugging Face repo of the sentence-transformer used for retrieval.
    pub embedding_model: String,
    /// CSV of field cluster reports; `None` serves an empty cluster list.
    pub clusters_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("RELIEF_BIND_ADDR") {
            Some(v) => v.parse().map_err(|e| ConfigError::invalid("RELIEF_BIND_ADDR", &v, e))?,
            None => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|e| ConfigError::invalid("RELIEF_BIND_ADDR", DEFAULT_BIND_ADDR, e))?,
        };

        let timeout_secs = match get("RELIEF_LLM_TIMEOUT_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(0) => return Err(ConfigError::invalid("RELIEF_LLM_TIMEOUT_SECS", &v, "must be positive")),
                Ok(n) => n,
                Err(e) => return Err(ConfigError::invalid("RELIEF_LLM_TIMEOUT_SECS", &v, e)),
            },
            None => DEFAULT_LLM_TIMEOUT_SECS,
        };

        let top_k = match get("RELIEF_TOP_K") {
            Some(v) => match v.parse::<usize>() {
                Ok(0) => return Err(ConfigError::invalid("RELIEF_TOP_K", &v, "must be positive")),
                Ok(n) => n,
                Err(e) => return Err(ConfigError::invalid("RELIEF_TOP_K", &v, e)),
            },
            None => DEFAULT_TOP_K,
        };

        let match_policy = match get("RELIEF_MATCH_POLICY") {
            Some(v) => v.parse().map_err(|e| ConfigError::invalid("RELIEF_MATCH_POLICY", &v, e))?,
            None => MatchPolicy::default(),
        };

        Ok(Self {
            bind_addr,
            snapshot_path: get("RELIEF_SNAPSHOT_PATH").map(PathBuf::from),
            llm: LlmConfig {
                url: get("RELIEF_LLM_URL").unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
                token: get("RELIEF_LLM_TOKEN"),
                timeout: Duration::from_secs(timeout_secs),
            },
            top_k,
            match_policy,
            embedding_model: get("RELIEF_EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            clusters_path: get("RELIEF_CLUSTERS_PATH").map(PathBuf::from),
        })
    }
}
