//! Drafting adapter that returns a fixed set of drafts.

use crate::task::domain::TaskDraft;
use crate::task::ports::{DraftingResult, TaskDrafter};
use async_trait::async_trait;

/// Drafter that ignores the input text and returns preconfigured drafts.
///
/// Blank input yields no drafts.
#[derive(Debug, Clone, Default)]
pub struct StaticTaskDrafter {
    drafts: Vec<TaskDraft>,
}

impl StaticTaskDrafter {
    /// Creates a drafter returning `drafts`.
    #[must_use]
    pub const fn new(drafts: Vec<TaskDraft>) -> Self {
        Self { drafts }
    }
}

#[async_trait]
impl TaskDrafter for StaticTaskDrafter {
    async fn analyze_tasks(&self, raw_text: &str) -> DraftingResult<Vec<TaskDraft>> {
        if raw_text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.drafts.clone())
    }
}
