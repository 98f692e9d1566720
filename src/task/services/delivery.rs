//! Publishing, pull requests, merging and conflict resolution.

use super::error::{TaskLifecycleError, TaskLifecycleResult};
use super::lifecycle::{TaskLifecycleService, ensure_status, require_branch};
use crate::bridge::domain::CommandContext;
use crate::bridge::ports::BridgeTransport;
use crate::task::domain::{
    BranchName, PullRequestDraft, PullRequestNumber, PullRequestRef, RecoveryAction, Task,
    TaskDomainError, TaskId, TaskStatus,
};
use crate::task::ports::{IssueTracker, IssueTrackerError, TaskRepository};
use crate::worktree::domain::{SlotId, WorktreeCommand};
use mockable::Clock;
use tracing::{info, warn};

/// Result of [`TaskLifecycleService::create_pull_request`].
#[derive(Debug)]
pub struct PullRequestCreated {
    /// Task in `PrCreated`.
    pub task: Task,
    /// Slot released now that the workspace is no longer needed.
    pub released_slot: Option<SlotId>,
    /// Workspace cleanup failure, reported without undoing the pull request.
    pub cleanup_error: Option<TaskLifecycleError>,
}

/// Result of [`TaskLifecycleService::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The pull request was merged.
    Merged(Task),
    /// The merge hit a content conflict; the task keeps `PrCreated` with its
    /// conflict flag set.
    Conflicted {
        /// Task with the conflict flag set.
        task: Task,
        /// Recovery that reopens the branch in a free slot.
        recovery: RecoveryAction,
    },
}

impl<R, I, T, C> TaskLifecycleService<R, I, T, C>
where
    R: TaskRepository,
    I: IssueTracker,
    T: BridgeTransport,
    C: Clock + Send + Sync,
{
    /// Pushes an implemented task's branch.
    ///
    /// With a bound workspace the branch is committed and pushed from it.
    /// Without one, the implementation text is published through the issue
    /// tracker on a fresh branch.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Conflict`] with a force-push recovery
    /// when the remote branch has diverged, and bridge or tracker errors for
    /// other failures.
    pub async fn push(&self, task_id: &TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.task(task_id).await?;
        let branch = require_branch(&task)?;
        ensure_status(&task, &[TaskStatus::Implemented], TaskStatus::Pushed)?;

        match self.slots.slot_for_task(task.id())? {
            Some(slot) => self.push_from_workspace(&task, &branch, slot.path(), false).await?,
            None => self.publish_through_tracker(&task, &branch).await?,
        }
        task.mark_pushed(&*self.clock)?;
        self.repository.update(&task).await?;
        info!(task_id = %task.id(), branch = %branch, "branch pushed");
        Ok(task)
    }

    /// Pushes the task's branch with `--force-with-lease`.
    ///
    /// This is the confirmed form of [`RecoveryAction::ForcePushWithLease`].
    /// An `Implemented` task advances to `Pushed`; a task resolving a merge
    /// conflict keeps its status.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NoWorkspace`] without a bound slot and
    /// [`TaskLifecycleError::Bridge`] when the push fails.
    pub async fn force_push_with_lease(
        &self,
        task_id: &TaskId,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.task(task_id).await?;
        let branch = require_branch(&task)?;
        let slot = self.bound_slot(&task)?;
        self.push_from_workspace(&task, &branch, slot.path(), true)
            .await?;
        if task.status() == TaskStatus::Implemented {
            task.mark_pushed(&*self.clock)?;
            self.repository.update(&task).await?;
        }
        info!(task_id = %task.id(), branch = %branch, "branch force-pushed with lease");
        Ok(task)
    }

    /// Opens the pull request for an implemented or pushed task and releases
    /// its workspace.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Tracker`] when the pull request cannot
    /// be created; workspace cleanup failures are reported in
    /// [`PullRequestCreated::cleanup_error`] instead.
    pub async fn create_pull_request(
        &self,
        task_id: &TaskId,
    ) -> TaskLifecycleResult<PullRequestCreated> {
        let mut task = self.task(task_id).await?;
        let branch = require_branch(&task)?;
        ensure_status(
            &task,
            &[TaskStatus::Implemented, TaskStatus::Pushed],
            TaskStatus::PrCreated,
        )?;

        let draft = PullRequestDraft {
            head: branch,
            base: self.settings.default_branch.clone(),
            title: task.title().to_owned(),
            body: pull_request_body(&task),
        };
        let pull_request = self.tracker.create_pull_request(&draft).await?;
        let number = pull_request.number();
        task.record_pull_request(pull_request, &*self.clock)?;
        self.repository.update(&task).await?;
        info!(task_id = %task.id(), pr_number = number.value(), "pull request created");

        let (released_slot, cleanup_error) = self.retire_workspace(&task).await;
        Ok(PullRequestCreated {
            task,
            released_slot,
            cleanup_error,
        })
    }

    /// Merges the task's pull request.
    ///
    /// A content conflict is not an error: the task keeps `PrCreated`, its
    /// conflict flag is set and the outcome carries the recovery that
    /// reopens the branch for manual resolution.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Tracker`] for merge failures that are
    /// not content conflicts.
    pub async fn merge(
        &self,
        task_id: &TaskId,
    ) -> TaskLifecycleResult<MergeOutcome> {
        let mut task = self.task(task_id).await?;
        let number = task
            .pull_request()
            .map(PullRequestRef::number)
            .ok_or_else(|| TaskDomainError::MissingPullRequest(task.id().clone()))?;
        ensure_status(&task, &[TaskStatus::PrCreated], TaskStatus::PrMerged)?;

        let err = match self.tracker.merge_pull_request(number, task.title()).await {
            Ok(()) => {
                task.mark_merged(&*self.clock)?;
                self.repository.update(&task).await?;
                info!(task_id = %task.id(), pr_number = number.value(), "pull request merged");
                return Ok(MergeOutcome::Merged(task));
            }
            Err(err) => err,
        };
        if !self.is_content_conflict(&err, number).await {
            warn!(task_id = %task.id(), pr_number = number.value(), error = %err, "merge failed");
            return Err(err.into());
        }

        let branch = require_branch(&task)?;
        task.mark_merge_conflict(&*self.clock)?;
        self.repository.update(&task).await?;
        warn!(
            task_id = %task.id(),
            pr_number = number.value(),
            error = %err,
            "merge blocked by content conflict"
        );
        let recovery = RecoveryAction::ResolveConflictInWorktree {
            task_id: task.id().clone(),
            branch,
        };
        Ok(MergeOutcome::Conflicted { task, recovery })
    }

    /// Reopens a conflicted task's existing branch in a free slot.
    ///
    /// This is the confirmed form of
    /// [`RecoveryAction::ResolveConflictInWorktree`]. The workspace is
    /// recreated from the pull request branch, not from the default branch.
    ///
    /// # Errors
    ///
    /// Returns a domain error when the task has no pending conflict,
    /// [`TaskLifecycleError::Slot`] when no slot is free, and the same
    /// workspace errors as [`Self::create_worktree`].
    pub async fn resolve_conflict_in_worktree(
        &self,
        task_id: &TaskId,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.task(task_id).await?;
        if !task.has_merge_conflict() {
            return Err(TaskDomainError::NoMergeConflict(task.id().clone()).into());
        }
        let branch = require_branch(&task)?;
        let repo_root = self.slots.root_path()?;

        let (reservation, slot) = self.reserve_workspace(&mut task, branch.clone()).await?;
        let command = WorktreeCommand::Reopen {
            repo_root,
            path: slot.path().to_owned(),
            branch,
        };
        self.open_workspace(task, reservation, &slot, &command).await
    }

    /// Pushes the resolved branch, clears the conflict flag and releases the
    /// workspace.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NoWorkspace`] without a bound slot, a
    /// domain error without a pending conflict, and the same push errors as
    /// [`Self::push`].
    pub async fn complete_conflict_resolution(
        &self,
        task_id: &TaskId,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.task(task_id).await?;
        if !task.has_merge_conflict() {
            return Err(TaskDomainError::NoMergeConflict(task.id().clone()).into());
        }
        let branch = require_branch(&task)?;
        let slot = self.bound_slot(&task)?;
        ensure_status(
            &task,
            &[TaskStatus::WorktreeActive, TaskStatus::Implemented],
            TaskStatus::PrCreated,
        )?;

        self.push_from_workspace(&task, &branch, slot.path(), false)
            .await?;
        task.finish_conflict_resolution(&*self.clock)?;
        self.repository.update(&task).await?;
        info!(task_id = %task.id(), branch = %branch, "merge conflict resolved");

        let (_, cleanup_error) = self.retire_workspace(&task).await;
        if let Some(err) = cleanup_error {
            warn!(task_id = %task.id(), error = %err, "workspace cleanup after resolution failed");
        }
        Ok(task)
    }

    async fn push_from_workspace(
        &self,
        task: &Task,
        branch: &BranchName,
        path: &str,
        force_with_lease: bool,
    ) -> TaskLifecycleResult<()> {
        let command = WorktreeCommand::Push {
            path: path.to_owned(),
            branch: branch.clone(),
            message: commit_message(task),
            force_with_lease,
        };
        let context = CommandContext::for_purpose("push")
            .in_directory(command.working_directory())
            .for_task(task.id().as_str());
        match self.dispatcher.run_sync(&command.render(), context).await {
            Ok(_) => Ok(()),
            Err(err) => {
                let text = err.diagnostic_text();
                if !force_with_lease && is_diverged_push(&text) {
                    warn!(task_id = %task.id(), branch = %branch, "push rejected, remote branch diverged");
                    return Err(TaskLifecycleError::conflict(
                        task.id(),
                        text,
                        RecoveryAction::ForcePushWithLease {
                            task_id: task.id().clone(),
                            branch: branch.clone(),
                        },
                    ));
                }
                Err(err.into())
            }
        }
    }

    /// Publishes the implementation through the tracker API when no
    /// workspace is bound.
    async fn publish_through_tracker(
        &self,
        task: &Task,
        branch: &BranchName,
    ) -> TaskLifecycleResult<()> {
        let implementation = task
            .agent()
            .implementation
            .as_deref()
            .ok_or_else(|| TaskDomainError::MissingImplementation(task.id().clone()))?;
        let base_sha = self
            .tracker
            .get_branch_head_sha(&self.settings.default_branch)
            .await?;
        match self.tracker.create_branch(branch, &base_sha).await {
            Ok(()) => {}
            Err(IssueTrackerError::Validation(message))
                if message.to_ascii_lowercase().contains("already exists") =>
            {
                info!(task_id = %task.id(), branch = %branch, "reusing existing remote branch");
            }
            Err(err) => return Err(err.into()),
        }
        let path = format!(".gropius/tasks/{}.md", task.id());
        let content = published_document(task, implementation);
        self.tracker
            .commit_file(branch, &path, &content, &commit_message(task))
            .await?;
        info!(task_id = %task.id(), branch = %branch, path, "implementation published through tracker");
        Ok(())
    }

    /// Tells a real content conflict apart from other merge refusals.
    async fn is_content_conflict(&self, err: &IssueTrackerError, number: PullRequestNumber) -> bool {
        if err.mentions_merge_conflict() {
            return true;
        }
        if !matches!(err, IssueTrackerError::MergeNotAllowed(_)) {
            return false;
        }
        match self.tracker.get_pull_request_details(number).await {
            Ok(details) => details.has_content_conflict(),
            Err(lookup) => {
                warn!(pr_number = number.value(), error = %lookup, "pull request details lookup failed");
                false
            }
        }
    }

    /// Removes the workspace and releases the slot once the branch lives
    /// upstream. The binding is released even when removal fails.
    async fn retire_workspace(&self, task: &Task) -> (Option<SlotId>, Option<TaskLifecycleError>) {
        let slot = match self.slots.slot_for_task(task.id()) {
            Ok(Some(slot)) => slot,
            Ok(None) => return (None, None),
            Err(err) => return (None, Some(err.into())),
        };
        let cleanup_error = self.remove_workspace(task, slot.path()).await.err();
        if let Some(err) = &cleanup_error {
            warn!(task_id = %task.id(), slot_id = %slot.id(), error = %err, "workspace removal failed");
        }
        match self.slots.release(slot.id()) {
            Ok(_) => {
                info!(task_id = %task.id(), slot_id = %slot.id(), "slot released");
                (Some(slot.id()), cleanup_error)
            }
            Err(err) => (None, Some(err.into())),
        }
    }
}

fn is_diverged_push(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    ["non-fast-forward", "fetch first", "updates were rejected", "stale info"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn commit_message(task: &Task) -> String {
    task.issue().map_or_else(
        || task.title().to_owned(),
        |issue| format!("{} (#{})", task.title(), issue.number()),
    )
}

fn pull_request_body(task: &Task) -> String {
    let mut body = task.description().to_owned();
    if let Some(issue) = task.issue() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&format!("Closes #{}", issue.number()));
    }
    body
}

fn published_document(task: &Task, implementation: &str) -> String {
    format!(
        "# {title}\n\n{description}\n\n## Implementation\n\n{implementation}\n",
        title = task.title(),
        description = task.description(),
    )
}
