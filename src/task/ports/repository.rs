//! Repository port for task persistence and lookup.

use crate::task::domain::{BranchName, IssueNumber, PullRequestNumber, Task, TaskId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Task persistence contract.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists or [`TaskRepositoryError::DuplicateIssue`] when the issue number
    /// already maps to a task.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Persists changes to an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn update(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Removes a task. Removing an unknown task is not an error.
    async fn remove(&self, id: &TaskId) -> TaskRepositoryResult<()>;

    /// Finds a task by internal task identifier.
    async fn find_by_id(&self, id: &TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Finds the task linked to an upstream issue.
    async fn find_by_issue_number(
        &self,
        number: IssueNumber,
    ) -> TaskRepositoryResult<Option<Task>>;

    /// Finds the task linked to an upstream pull request.
    async fn find_by_pull_request_number(
        &self,
        number: PullRequestNumber,
    ) -> TaskRepositoryResult<Option<Task>>;

    /// Finds the task working on a branch.
    async fn find_by_branch(&self, branch: &BranchName) -> TaskRepositoryResult<Option<Task>>;

    /// Returns every task ordered by creation time.
    async fn list_all(&self) -> TaskRepositoryResult<Vec<Task>>;

    /// Replaces the whole task set, as done when a session is restored.
    async fn replace_all(&self, tasks: Vec<Task>) -> TaskRepositoryResult<()>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// A task for the issue already exists.
    #[error("issue #{0} is already tracked by another task")]
    DuplicateIssue(IssueNumber),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
