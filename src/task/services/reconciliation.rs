//! Folding upstream issue and pull request state into local tasks.

use super::error::TaskLifecycleResult;
use crate::task::domain::{BranchName, IssueNumber, PullRequestSummary, Task, TaskId, TaskStatus};
use crate::task::ports::{IssueTracker, TaskRepository, TaskRepositoryError};
use crate::worktree::services::WorktreeSlotAllocator;
use mockable::Clock;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Outcome of a serialized reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome<T> {
    /// The pass ran to completion.
    Completed(T),
    /// Another pass was already running, so this trigger was ignored.
    Skipped,
}

/// Counts from one [`ReconciliationService::reconcile`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Local tasks refreshed from a pull request.
    pub updated: usize,
    /// Tasks synthesised for pull requests with no local counterpart.
    pub created: usize,
    /// Tasks imported from open issues with no local counterpart.
    pub imported_issues: usize,
    /// Matched tasks whose status was kept because local work is in flight.
    pub kept_local: usize,
    /// Slots freed because their task moved on to a pull request upstream.
    pub released_slots: usize,
}

/// Merges externally observed state into local tasks.
///
/// Local progress always wins: a task in a workspace-bound status, or with
/// a pending merge conflict, keeps its status and branch, and a merged task
/// is never downgraded. A task advanced to `PrCreated` or `PrMerged` gives
/// up its slot; the worktree directory stays on disk until a later create
/// on that slot offers to clean it up. Only one pass runs at a time;
/// triggers that arrive while a pass is running are ignored.
pub struct ReconciliationService<R, I, C>
where
    R: TaskRepository,
    I: IssueTracker,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    tracker: Arc<I>,
    slots: Arc<WorktreeSlotAllocator>,
    clock: Arc<C>,
    running: AtomicBool,
}

/// Clears the running flag when a pass ends, including on early return.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R, I, C> ReconciliationService<R, I, C>
where
    R: TaskRepository,
    I: IssueTracker,
    C: Clock + Send + Sync,
{
    /// Creates a new reconciliation service.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        tracker: Arc<I>,
        slots: Arc<WorktreeSlotAllocator>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            tracker,
            slots,
            clock,
            running: AtomicBool::new(false),
        }
    }

    /// Returns `true` while a pass is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Fetches merged and open pull requests and open issues and folds them
    /// into local tasks.
    ///
    /// # Errors
    ///
    /// Returns tracker errors from the fetches, repository errors from the
    /// writes and slot errors from releases. A failure part-way leaves earlier writes in place.
    pub async fn reconcile(&self) -> TaskLifecycleResult<PassOutcome<ReconciliationReport>> {
        let Some(_guard) = self.begin_pass() else {
            return Ok(PassOutcome::Skipped);
        };

        let merged = self.tracker.list_merged_pull_requests().await?;
        let open = self.tracker.list_open_pull_requests().await?;
        let issues = self.tracker.list_open_issues().await?;

        let mut report = ReconciliationReport::default();
        for summary in open.iter().chain(merged.iter()) {
            self.fold_pull_request(summary, &mut report).await?;
        }
        for issue in &issues {
            if self
                .repository
                .find_by_issue_number(issue.issue.number())
                .await?
                .is_some()
            {
                continue;
            }
            match Task::from_open_issue(issue, &*self.clock) {
                Ok(task) => {
                    self.repository.store(&task).await?;
                    debug!(task_id = %task.id(), issue_number = issue.issue.number().value(), "imported open issue");
                    report.imported_issues += 1;
                }
                Err(err) => {
                    debug!(issue_number = issue.issue.number().value(), error = %err, "skipping open issue");
                }
            }
        }

        info!(
            updated = report.updated,
            created = report.created,
            imported_issues = report.imported_issues,
            kept_local = report.kept_local,
            released_slots = report.released_slots,
            "reconciliation finished"
        );
        Ok(PassOutcome::Completed(report))
    }

    /// Removes `IssueCreated` tasks whose issue is no longer open upstream.
    ///
    /// Tasks in any other status are kept. Returns the removed task ids.
    ///
    /// # Errors
    ///
    /// Returns tracker or repository errors.
    pub async fn prune_closed_issues(&self) -> TaskLifecycleResult<PassOutcome<Vec<TaskId>>> {
        let Some(_guard) = self.begin_pass() else {
            return Ok(PassOutcome::Skipped);
        };

        let open: HashSet<IssueNumber> = self
            .tracker
            .list_open_issues()
            .await?
            .iter()
            .map(|issue| issue.issue.number())
            .collect();

        let mut removed = Vec::new();
        for task in self.repository.list_all().await? {
            let closed_upstream = task
                .issue()
                .is_some_and(|issue| !open.contains(&issue.number()));
            if task.status() == TaskStatus::IssueCreated && closed_upstream {
                self.repository.remove(task.id()).await?;
                info!(task_id = %task.id(), "removed task whose issue was closed upstream");
                removed.push(task.id().clone());
            }
        }
        Ok(PassOutcome::Completed(removed))
    }

    fn begin_pass(&self) -> Option<PassGuard<'_>> {
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("reconciliation already running, ignoring trigger");
            return None;
        }
        Some(PassGuard(&self.running))
    }

    async fn fold_pull_request(
        &self,
        summary: &PullRequestSummary,
        report: &mut ReconciliationReport,
    ) -> TaskLifecycleResult<()> {
        let Some(mut task) = self.find_local(summary).await? else {
            match Task::from_remote_pull_request(summary, &*self.clock) {
                Ok(task) => match self.repository.store(&task).await {
                    Ok(()) => {
                        debug!(task_id = %task.id(), pr_number = summary.number().value(), "synthesised task for pull request");
                        report.created += 1;
                    }
                    Err(
                        err @ (TaskRepositoryError::DuplicateTask(_)
                        | TaskRepositoryError::DuplicateIssue(_)),
                    ) => {
                        debug!(pr_number = summary.number().value(), error = %err, "pull request already represented locally");
                    }
                    Err(err) => return Err(err.into()),
                },
                Err(err) => {
                    debug!(pr_number = summary.number().value(), error = %err, "skipping pull request");
                }
            }
            return Ok(());
        };

        let in_flight = task.is_locally_in_flight();
        if task.apply_remote_pull_request(summary, &*self.clock) {
            self.repository.update(&task).await?;
            report.updated += 1;
        }
        if !in_flight
            && matches!(task.status(), TaskStatus::PrCreated | TaskStatus::PrMerged)
        {
            if let Some(slot) = self.slots.release_task(task.id())? {
                info!(task_id = %task.id(), slot_id = %slot, status = %task.status(), "slot released after upstream pull request");
                report.released_slots += 1;
            }
        }
        if in_flight {
            debug!(
                task_id = %task.id(),
                status = %task.status(),
                merge_conflict = task.has_merge_conflict(),
                "kept local status over upstream pull request"
            );
            report.kept_local += 1;
        }
        Ok(())
    }

    /// Matches by pull request number, then by head branch or linked issue
    /// for tasks that have no pull request yet.
    async fn find_local(&self, summary: &PullRequestSummary) -> TaskLifecycleResult<Option<Task>> {
        if let Some(task) = self
            .repository
            .find_by_pull_request_number(summary.number())
            .await?
        {
            return Ok(Some(task));
        }
        let by_branch = match BranchName::new(summary.head_branch.clone()) {
            Ok(branch) => self.repository.find_by_branch(&branch).await?,
            Err(_) => None,
        };
        let candidate = match (by_branch, &summary.linked_issue) {
            (Some(task), _) => Some(task),
            (None, Some(issue)) => self.repository.find_by_issue_number(issue.number()).await?,
            (None, None) => None,
        };
        Ok(candidate.filter(|task| task.pull_request().is_none()))
    }
}
