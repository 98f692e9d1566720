//! Recovery actions offered alongside conflict errors.

use super::{BranchName, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user-confirmed action that resolves a surfaced conflict.
///
/// Recovery actions are only ever offered. The caller executes one through
/// the matching lifecycle operation once the user agrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Remove the workspace registered at `path` before retrying.
    CleanupWorktree {
        /// Path of the conflicting workspace.
        path: String,
    },
    /// Push the branch again with `--force-with-lease`.
    ForcePushWithLease {
        /// Task whose branch diverged.
        task_id: TaskId,
        /// Diverged branch.
        branch: BranchName,
    },
    /// Reopen a workspace on the existing branch to resolve a merge conflict.
    ResolveConflictInWorktree {
        /// Task whose pull request conflicts.
        task_id: TaskId,
        /// Pull request head branch.
        branch: BranchName,
    },
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CleanupWorktree { path } => write!(f, "clean up the worktree at {path}"),
            Self::ForcePushWithLease { branch, .. } => {
                write!(f, "force-push {branch} with lease")
            }
            Self::ResolveConflictInWorktree { branch, .. } => {
                write!(f, "resolve the conflict on {branch} in a fresh worktree")
            }
        }
    }
}
