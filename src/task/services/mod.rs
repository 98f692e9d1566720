//! Application services for task lifecycle orchestration.

mod agent_run;
mod delivery;
mod error;
mod intake;
mod lifecycle;
mod reconciliation;

pub use delivery::{MergeOutcome, PullRequestCreated};
pub use error::{TaskLifecycleError, TaskLifecycleResult, WorkspaceConflict};
pub use intake::TaskIntakeService;
pub use lifecycle::{LifecycleSettings, TaskLifecycleService};
pub use reconciliation::{PassOutcome, ReconciliationReport, ReconciliationService};
