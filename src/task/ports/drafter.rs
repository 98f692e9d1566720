//! Port for the text-generation service that classifies raw task input.

use crate::task::domain::TaskDraft;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for drafting operations.
pub type DraftingResult<T> = Result<T, DraftingError>;

/// Turns free-form text into classified task drafts.
#[async_trait]
pub trait TaskDrafter: Send + Sync {
    /// Splits and classifies `raw_text` into task drafts.
    async fn analyze_tasks(&self, raw_text: &str) -> DraftingResult<Vec<TaskDraft>>;
}

/// Errors returned by drafting implementations.
#[derive(Debug, Clone, Error)]
pub enum DraftingError {
    /// The service answered with something that is not a draft list.
    #[error("drafting response could not be parsed: {0}")]
    InvalidResponse(String),

    /// The service could not be reached or rejected the request.
    #[error("drafting service error: {0}")]
    Service(Arc<dyn std::error::Error + Send + Sync>),
}

impl DraftingError {
    /// Wraps a service error.
    pub fn service(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Service(Arc::new(err))
    }
}
