//! Pull-request value objects exchanged with the external issue tracker.

use super::{BranchName, IssueRef, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Positive pull request number from the external tracker.
///
/// # Examples
///
///     use gropius::task::domain::PullRequestNumber;
///
///     let pr_num = PullRequestNumber::new(42).expect("valid");
///     assert_eq!(pr_num.value(), 42);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    /// Creates a validated pull request number.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidPullRequestNumber`] when the value
    /// is zero.
    pub const fn new(value: u64) -> Result<Self, TaskDomainError> {
        if value == 0 {
            return Err(TaskDomainError::InvalidPullRequestNumber(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PullRequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a pull request that exists upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestRef {
    number: PullRequestNumber,
    url: String,
}

impl PullRequestRef {
    /// Creates a pull request reference.
    #[must_use]
    pub fn new(number: PullRequestNumber, url: impl Into<String>) -> Self {
        Self {
            number,
            url: url.into(),
        }
    }

    /// Returns the pull request number.
    #[must_use]
    pub const fn number(&self) -> PullRequestNumber {
        self.number
    }

    /// Returns the browser URL of the pull request.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Payload for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    /// Source branch.
    pub head: BranchName,
    /// Target branch.
    pub base: String,
    /// Pull request title.
    pub title: String,
    /// Markdown body.
    pub body: String,
}

/// Pull request as listed by the tracker's open/merged queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    /// Pull request reference.
    pub pull_request: PullRequestRef,
    /// Pull request title.
    pub title: String,
    /// Head branch name as reported upstream.
    pub head_branch: String,
    /// Issue the pull request closes, when the tracker links one.
    pub linked_issue: Option<IssueRef>,
    /// Whether the pull request has been merged.
    pub merged: bool,
}

impl PullRequestSummary {
    /// Returns the pull request number.
    #[must_use]
    pub const fn number(&self) -> PullRequestNumber {
        self.pull_request.number()
    }
}

/// Mergeability details for a single pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDetails {
    /// Target branch.
    pub base: String,
    /// Source branch.
    pub head: String,
    /// Raw mergeable state (`clean`, `dirty`, `blocked`, `unknown`, ...).
    pub mergeable_state: String,
}

impl PullRequestDetails {
    /// Returns `true` when the tracker reports a content conflict.
    #[must_use]
    pub fn has_content_conflict(&self) -> bool {
        self.mergeable_state.trim().eq_ignore_ascii_case("dirty")
    }
}
