//! Turning raw task descriptions into formatted tasks.

use super::error::TaskLifecycleResult;
use crate::task::domain::{Task, TaskDraft};
use crate::task::ports::{TaskDrafter, TaskRepository};
use mockable::Clock;
use std::sync::Arc;
use tracing::{info, warn};

/// Creates `Formatted` tasks from drafts.
#[derive(Clone)]
pub struct TaskIntakeService<R, D, C>
where
    R: TaskRepository,
    D: TaskDrafter,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    drafter: Arc<D>,
    clock: Arc<C>,
}

impl<R, D, C> TaskIntakeService<R, D, C>
where
    R: TaskRepository,
    D: TaskDrafter,
    C: Clock + Send + Sync,
{
    /// Creates a new intake service.
    #[must_use]
    pub const fn new(repository: Arc<R>, drafter: Arc<D>, clock: Arc<C>) -> Self {
        Self {
            repository,
            drafter,
            clock,
        }
    }

    /// Classifies `raw_text` into drafts and stores one task per draft.
    ///
    /// Drafts without a title are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskLifecycleError::Drafting`] when the drafting
    /// service fails, or a repository error when a task cannot be stored.
    pub async fn draft_tasks(&self, raw_text: &str) -> TaskLifecycleResult<Vec<Task>> {
        let drafts = self.drafter.analyze_tasks(raw_text).await?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match Task::new(draft, &*self.clock) {
                Ok(task) => {
                    self.repository.store(&task).await?;
                    created.push(task);
                }
                Err(err) => warn!(error = %err, "skipping unusable task draft"),
            }
        }
        info!(count = created.len(), "tasks drafted");
        Ok(created)
    }

    /// Stores one task from an explicit draft.
    ///
    /// # Errors
    ///
    /// Returns a domain error for an empty title or a repository error when
    /// the task cannot be stored.
    pub async fn create_task(&self, draft: TaskDraft) -> TaskLifecycleResult<Task> {
        let task = Task::new(draft, &*self.clock)?;
        self.repository.store(&task).await?;
        info!(task_id = %task.id(), "task created");
        Ok(task)
    }

    /// Lists every task in creation order.
    ///
    /// # Errors
    ///
    /// Returns a repository error when the listing fails.
    pub async fn list_tasks(&self) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.list_all().await?)
    }
}
