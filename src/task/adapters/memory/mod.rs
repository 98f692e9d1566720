//! In-memory adapters for tests and local development.

mod drafter;
mod issue_tracker;
mod task;

pub use drafter::StaticTaskDrafter;
pub use issue_tracker::{CommittedFile, InMemoryIssueTracker, TrackerOperation};
pub use task::InMemoryTaskRepository;
