use thiserror::Error;

use crate::plan::PlanError;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("failed to render prompt: {0}")]
    Render(String),
}

pub type AiResult<T> = Result<T, AiError>;

/// Reject blank situation text before any work is done.
pub fn require_query(query: &str) -> AiResult<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AiError::InvalidInput("query must not be empty".to_string()));
    }
    Ok(trimmed)
}
