//! Port contracts for task lifecycle management.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod drafter;
pub mod issue_tracker;
pub mod repository;

pub use drafter::{DraftingError, DraftingResult, TaskDrafter};
pub use issue_tracker::{CommitStatus, IssueTracker, IssueTrackerError, IssueTrackerResult};
pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
