//! Lifecycle status and the small enumerations attached to a task.

use super::{ParseTaskStatusError, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
///
/// Variants are declared in pipeline order so `Ord` answers "at or beyond".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Raw input has been classified into a task record.
    Formatted,
    /// An issue exists upstream for the task.
    IssueCreated,
    /// A slot is reserved and the workspace command is in flight.
    WorktreeInitializing,
    /// A workspace exists and is bound to the task.
    WorktreeActive,
    /// The agent produced an implementation.
    Implemented,
    /// The branch has been pushed.
    Pushed,
    /// A pull request is open.
    PrCreated,
    /// The pull request has been merged.
    PrMerged,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Formatted => "formatted",
            Self::IssueCreated => "issue_created",
            Self::WorktreeInitializing => "worktree_initializing",
            Self::WorktreeActive => "worktree_active",
            Self::Implemented => "implemented",
            Self::Pushed => "pushed",
            Self::PrCreated => "pr_created",
            Self::PrMerged => "pr_merged",
        }
    }

    /// Returns `true` when no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PrMerged)
    }

    /// Returns `true` for the statuses in which a local workspace flow owns
    /// the task.
    #[must_use]
    pub const fn is_workspace_bound(self) -> bool {
        matches!(
            self,
            Self::WorktreeInitializing | Self::WorktreeActive | Self::Implemented
        )
    }

    /// Returns `true` if the lifecycle permits moving from `self` to
    /// `target`.
    ///
    /// Reconciliation bypasses this table when it folds in upstream pull
    /// request state.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Formatted, Self::IssueCreated)
                | (
                    Self::IssueCreated | Self::PrCreated,
                    Self::WorktreeInitializing
                )
                | (
                    Self::WorktreeInitializing,
                    Self::WorktreeActive | Self::IssueCreated | Self::PrCreated
                )
                | (
                    Self::WorktreeActive,
                    Self::Implemented | Self::WorktreeActive | Self::IssueCreated | Self::PrCreated
                )
                | (
                    Self::Implemented,
                    Self::Pushed | Self::PrCreated | Self::WorktreeActive | Self::IssueCreated
                )
                | (Self::Pushed, Self::PrCreated | Self::IssueCreated)
                | (Self::PrCreated, Self::PrMerged)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "formatted" => Ok(Self::Formatted),
            "issue_created" => Ok(Self::IssueCreated),
            "worktree_initializing" => Ok(Self::WorktreeInitializing),
            "worktree_active" => Ok(Self::WorktreeActive),
            "implemented" => Ok(Self::Implemented),
            "pushed" => Ok(Self::Pushed),
            "pr_created" => Ok(Self::PrCreated),
            "pr_merged" => Ok(Self::PrMerged),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Urgent work.
    High,
    /// Default priority.
    #[default]
    Medium,
    /// Nice to have.
    Low,
}

impl Priority {
    /// Returns the canonical label text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl TryFrom<&str> for Priority {
    type Error = TaskDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(TaskDomainError::InvalidPriority(value.to_owned())),
        }
    }
}

/// Outcome of the most recent agent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunState {
    /// No run has happened since the last reset.
    #[default]
    Idle,
    /// A run is in flight.
    Running,
    /// The last run finished with non-empty output.
    Succeeded,
    /// The last run crashed, timed out or produced nothing.
    Failed,
    /// The last run was cancelled.
    Cancelled,
}

/// Combined CI status last observed for the task branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Checks are still running or have not reported.
    Pending,
    /// All checks passed.
    Success,
    /// At least one check failed.
    Failed,
}

impl CheckStatus {
    /// Maps a tracker combined-status string onto a check status.
    ///
    /// Unknown states are treated as pending.
    #[must_use]
    pub fn from_tracker_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failure" | "failed" | "error" => Self::Failed,
            _ => Self::Pending,
        }
    }
}
