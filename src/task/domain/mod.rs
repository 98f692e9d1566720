//! Domain model for task lifecycle management.
//!
//! The task domain models classified task records, their issue and pull
//! request links, the lifecycle state machine and the recovery actions
//! offered when a flow hits a conflict, while keeping all infrastructure
//! concerns outside of the domain boundary.

mod branch;
mod draft;
mod error;
mod ids;
mod issue;
mod pull_request;
mod recovery;
mod status;
mod task;

pub use branch::BranchName;
pub use draft::TaskDraft;
pub use error::{ParseTaskStatusError, TaskDomainError};
pub use ids::{IssueNumber, TaskId};
pub use issue::{IssueDraft, IssueRef, OpenIssue};
pub use pull_request::{
    PullRequestDetails, PullRequestDraft, PullRequestNumber, PullRequestRef, PullRequestSummary,
};
pub use recovery::RecoveryAction;
pub use status::{AgentRunState, CheckStatus, Priority, TaskStatus};
pub use task::{AgentArtifacts, Task, WorktreeReservation};
