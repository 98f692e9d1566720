//! Port for the external issue tracker.
//!
//! The tracker creates issues, branches, commits and pull requests and
//! reports typed failures. Callers use the failure kind to choose between
//! retrying later, surfacing the failure and offering a recovery action.

use crate::error::{ErrorKind, ExternalApiKind};
use crate::task::domain::{
    BranchName, IssueDraft, IssueRef, OpenIssue, PullRequestDetails, PullRequestDraft,
    PullRequestNumber, PullRequestRef, PullRequestSummary,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for issue tracker operations.
pub type IssueTrackerResult<T> = Result<T, IssueTrackerError>;

/// Combined commit status reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    /// Raw combined state (`pending`, `success`, `failure`, `error`).
    pub state: String,
}

/// Issue tracker capability consumed by the lifecycle services.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Creates an issue.
    async fn create_issue(&self, draft: &IssueDraft) -> IssueTrackerResult<IssueRef>;

    /// Lists open issues.
    async fn list_open_issues(&self) -> IssueTrackerResult<Vec<OpenIssue>>;

    /// Creates `branch` pointing at `base_sha`.
    async fn create_branch(&self, branch: &BranchName, base_sha: &str) -> IssueTrackerResult<()>;

    /// Returns the head commit of `branch`.
    async fn get_branch_head_sha(&self, branch: &str) -> IssueTrackerResult<String>;

    /// Commits one file to `branch`.
    async fn commit_file(
        &self,
        branch: &BranchName,
        path: &str,
        content: &str,
        message: &str,
    ) -> IssueTrackerResult<()>;

    /// Opens a pull request.
    async fn create_pull_request(
        &self,
        draft: &PullRequestDraft,
    ) -> IssueTrackerResult<PullRequestRef>;

    /// Merges a pull request.
    async fn merge_pull_request(
        &self,
        number: PullRequestNumber,
        title: &str,
    ) -> IssueTrackerResult<()>;

    /// Lists open pull requests.
    async fn list_open_pull_requests(&self) -> IssueTrackerResult<Vec<PullRequestSummary>>;

    /// Lists merged pull requests.
    async fn list_merged_pull_requests(&self) -> IssueTrackerResult<Vec<PullRequestSummary>>;

    /// Returns mergeability details of a pull request.
    async fn get_pull_request_details(
        &self,
        number: PullRequestNumber,
    ) -> IssueTrackerResult<PullRequestDetails>;

    /// Returns the combined commit status of `reference`.
    async fn get_commit_status(&self, reference: &str) -> IssueTrackerResult<CommitStatus>;
}

/// Errors returned by issue tracker implementations.
#[derive(Debug, Clone, Error)]
pub enum IssueTrackerError {
    /// The tracker throttled the caller.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Tracker message.
        message: String,
        /// Suggested wait before retrying, when the tracker reports one.
        retry_after_secs: Option<u64>,
    },

    /// The credentials lack a required permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The tracker rejected the payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The pull request cannot be merged in its current state.
    #[error("merge not allowed: {0}")]
    MergeNotAllowed(String),

    /// The tracker could not be reached or answered garbage.
    #[error("tracker transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl IssueTrackerError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Returns the tracker sub-kind.
    #[must_use]
    pub const fn api_kind(&self) -> ExternalApiKind {
        match self {
            Self::RateLimited { .. } => ExternalApiKind::RateLimited,
            Self::PermissionDenied(_) => ExternalApiKind::PermissionDenied,
            Self::NotFound(_) => ExternalApiKind::NotFound,
            Self::Validation(_) => ExternalApiKind::Validation,
            Self::MergeNotAllowed(_) => ExternalApiKind::MergeNotAllowed,
            Self::Transport(_) => ExternalApiKind::Transport,
        }
    }

    /// Classifies the error for callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::ExternalApi(self.api_kind())
    }

    /// Returns `true` when the message describes a content conflict.
    ///
    /// Only merge and validation failures can carry one.
    #[must_use]
    pub fn mentions_merge_conflict(&self) -> bool {
        match self {
            Self::MergeNotAllowed(message) | Self::Validation(message) => {
                let lowered = message.to_ascii_lowercase();
                lowered.contains("not mergeable") || lowered.contains("conflict")
            }
            _ => false,
        }
    }
}
