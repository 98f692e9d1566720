//! Error types for task domain validation and parsing.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task identifier is empty or contains whitespace.
    #[error("invalid task id '{0}'")]
    InvalidTaskId(String),

    /// The issue number is invalid.
    #[error("invalid issue number {0}, expected a positive integer")]
    InvalidIssueNumber(u64),

    /// The pull request number is invalid.
    #[error("invalid pull request number {0}, expected a positive integer")]
    InvalidPullRequestNumber(u64),

    /// The branch name breaks the naming rules.
    #[error("invalid branch name '{0}'")]
    InvalidBranchName(String),

    /// The priority label is unknown.
    #[error("unknown priority '{0}'")]
    InvalidPriority(String),

    /// The lifecycle does not permit the requested transition.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        /// Task being transitioned.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// The operation needs a branch the task does not have.
    #[error("task {0} has no branch")]
    MissingBranch(TaskId),

    /// The operation needs an upstream issue the task does not have.
    #[error("task {0} has no issue")]
    MissingIssue(TaskId),

    /// The operation needs a pull request the task does not have.
    #[error("task {0} has no pull request")]
    MissingPullRequest(TaskId),

    /// The operation needs an implementation the task does not have.
    #[error("task {0} has no implementation to publish")]
    MissingImplementation(TaskId),

    /// An issue was already recorded for the task.
    #[error("task {0} already has an issue")]
    IssueAlreadyRecorded(TaskId),

    /// A different pull request was already recorded for the task.
    #[error("task {0} already has a different pull request")]
    PullRequestAlreadyRecorded(TaskId),

    /// The agent run finished without producing output.
    #[error("agent run for task {0} produced no output")]
    EmptyAgentOutput(TaskId),

    /// Review feedback is empty after trimming.
    #[error("review feedback must not be empty")]
    EmptyFeedback,

    /// Conflict resolution was requested for a task without a conflict.
    #[error("task {0} has no pending merge conflict")]
    NoMergeConflict(TaskId),
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
