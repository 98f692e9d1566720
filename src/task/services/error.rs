//! Service-level errors for task orchestration.

use crate::bridge::domain::BridgeError;
use crate::error::{ErrorKind, ExternalApiKind};
use crate::task::domain::{RecoveryAction, TaskDomainError, TaskId};
use crate::task::ports::{DraftingError, IssueTrackerError, TaskRepositoryError};
use crate::worktree::domain::SlotError;
use std::fmt;
use thiserror::Error;

/// A logical conflict surfaced together with the recovery the caller may
/// confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConflict {
    /// Task the conflict was detected for.
    pub task_id: TaskId,
    /// Diagnostic text, usually the failing command's output.
    pub message: String,
    /// Recovery action the caller may run after confirmation.
    pub recovery: RecoveryAction,
}

impl fmt::Display for WorkspaceConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflict for task {}: {} (recovery: {})",
            self.task_id, self.message, self.recovery
        )
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// The issue tracker rejected a request.
    #[error(transparent)]
    Tracker(#[from] IssueTrackerError),
    /// The automation bridge call failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// The slot pool rejected an operation.
    #[error(transparent)]
    Slot(#[from] SlotError),
    /// The drafting service failed.
    #[error(transparent)]
    Drafting(#[from] DraftingError),
    /// A conflict that needs a confirmed recovery action.
    #[error("{0}")]
    Conflict(Box<WorkspaceConflict>),
    /// No task has the requested id.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// The operation needs a bound worktree slot.
    #[error("task {0} has no bound worktree")]
    NoWorkspace(TaskId),
    /// An agent run is already in flight for the task.
    #[error("an agent run is already in progress for task {0}")]
    AgentRunInProgress(TaskId),
    /// No agent run is in flight for the task.
    #[error("no agent run is in progress for task {0}")]
    NoAgentRun(TaskId),
    /// The agent run was cancelled before it implemented the task.
    #[error("agent run for task {0} was cancelled")]
    AgentRunCancelled(TaskId),
}

impl TaskLifecycleError {
    pub(crate) fn conflict(
        task_id: &TaskId,
        message: impl Into<String>,
        recovery: RecoveryAction,
    ) -> Self {
        Self::Conflict(Box::new(WorkspaceConflict {
            task_id: task_id.clone(),
            message: message.into(),
            recovery,
        }))
    }

    /// Classifies the error for callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(TaskDomainError::InvalidStateTransition { .. })
            | Self::Repository(
                TaskRepositoryError::DuplicateTask(_) | TaskRepositoryError::DuplicateIssue(_),
            )
            | Self::Conflict(_)
            | Self::NoWorkspace(_)
            | Self::AgentRunInProgress(_) => ErrorKind::Conflict,
            Self::Domain(_)
            | Self::Repository(TaskRepositoryError::NotFound(_))
            | Self::NotFound(_)
            | Self::NoAgentRun(_) => ErrorKind::Validation,
            Self::Repository(TaskRepositoryError::Persistence(_)) => ErrorKind::Persistence,
            Self::Tracker(err) => err.kind(),
            Self::Bridge(err) => err.kind(),
            Self::AgentRunCancelled(_) => ErrorKind::CommandFailure,
            Self::Slot(err) => err.kind(),
            Self::Drafting(DraftingError::InvalidResponse(_)) => ErrorKind::Protocol,
            Self::Drafting(DraftingError::Service(_)) => {
                ErrorKind::ExternalApi(ExternalApiKind::Transport)
            }
        }
    }

    /// Returns the recovery action offered with a conflict.
    #[must_use]
    pub fn recovery(&self) -> Option<&RecoveryAction> {
        match self {
            Self::Conflict(conflict) => Some(&conflict.recovery),
            _ => None,
        }
    }
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;
