//! Task lifecycle orchestration: issues, workspaces and pool changes.

use super::agent_run::AgentRunRegistry;
use super::error::{TaskLifecycleError, TaskLifecycleResult};
use crate::bridge::domain::{BridgeError, CommandContext, CommandTemplate, OpenWindowRequest};
use crate::bridge::ports::BridgeTransport;
use crate::bridge::services::{CommandDispatcher, JobPoller, PollSettings};
use crate::task::domain::{
    BranchName, CheckStatus, IssueDraft, RecoveryAction, Task, TaskDomainError, TaskId,
    TaskStatus, WorktreeReservation,
};
use crate::task::ports::{IssueTracker, TaskRepository};
use crate::worktree::domain::{WorktreeCommand, WorktreeSlot};
use crate::worktree::services::WorktreeSlotAllocator;
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings shared by every lifecycle flow.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Branch new workspaces start from and pull requests target.
    pub default_branch: String,
    /// Command line that runs the code-generation agent.
    pub agent_command: CommandTemplate,
    /// Open a terminal window once a workspace is ready.
    pub launch_window: bool,
    /// Poll cadence for asynchronous agent jobs.
    pub poll: PollSettings,
}

impl LifecycleSettings {
    /// Creates settings with window launching off and default polling.
    #[must_use]
    pub fn new(default_branch: impl Into<String>, agent_command: CommandTemplate) -> Self {
        Self {
            default_branch: default_branch.into(),
            agent_command,
            launch_window: false,
            poll: PollSettings::default(),
        }
    }
}

/// Task lifecycle orchestration service.
///
/// Each operation loads the task, validates the transition, performs the
/// external call and only then persists the new state. Operations that wrap
/// workspace creation reserve the slot and the task first and roll both back
/// when the bridge command fails.
pub struct TaskLifecycleService<R, I, T, C>
where
    R: TaskRepository,
    I: IssueTracker,
    T: BridgeTransport,
    C: Clock + Send + Sync,
{
    pub(super) repository: Arc<R>,
    pub(super) tracker: Arc<I>,
    pub(super) dispatcher: Arc<CommandDispatcher<T>>,
    pub(super) poller: JobPoller<T, C>,
    pub(super) slots: Arc<WorktreeSlotAllocator>,
    pub(super) clock: Arc<C>,
    pub(super) settings: LifecycleSettings,
    pub(super) agent_runs: AgentRunRegistry,
}

impl<R, I, T, C> TaskLifecycleService<R, I, T, C>
where
    R: TaskRepository,
    I: IssueTracker,
    T: BridgeTransport,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        tracker: Arc<I>,
        dispatcher: Arc<CommandDispatcher<T>>,
        slots: Arc<WorktreeSlotAllocator>,
        clock: Arc<C>,
        settings: LifecycleSettings,
    ) -> Self {
        let poller = JobPoller::new(Arc::clone(&dispatcher), Arc::clone(&clock), settings.poll);
        Self {
            repository,
            tracker,
            dispatcher,
            poller,
            slots,
            clock,
            settings,
            agent_runs: AgentRunRegistry::default(),
        }
    }

    /// Returns the slot allocator shared with this service.
    #[must_use]
    pub const fn slots(&self) -> &Arc<WorktreeSlotAllocator> {
        &self.slots
    }

    /// Loads a task by id.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown ids or
    /// [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn task(&self, task_id: &TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| TaskLifecycleError::NotFound(task_id.clone()))
    }

    /// Creates the upstream issue for a formatted task.
    ///
    /// A tracker failure leaves the task untouched in `Formatted`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Tracker`] when issue creation fails, or
    /// a domain error when the task is not `Formatted`.
    pub async fn create_issue(&self, task_id: &TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.task(task_id).await?;
        if task.issue().is_some() {
            return Err(TaskDomainError::IssueAlreadyRecorded(task.id().clone()).into());
        }
        ensure_status(&task, &[TaskStatus::Formatted], TaskStatus::IssueCreated)?;

        let issue = self
            .tracker
            .create_issue(&IssueDraft::for_task(&task))
            .await
            .inspect_err(|err| {
                warn!(task_id = %task.id(), error = %err, "issue creation failed");
            })?;
        let number = issue.number();
        task.record_issue(issue, &*self.clock)?;
        self.repository.update(&task).await?;
        info!(task_id = %task.id(), issue_number = number.value(), "issue created");
        Ok(task)
    }

    /// Creates a workspace for an issue-backed task on the lowest free slot.
    ///
    /// The slot binding and the `WorktreeInitializing` status are recorded
    /// before the workspace command runs. A failed command releases the slot
    /// and returns the task to `IssueCreated`; when git reports the branch is
    /// already checked out elsewhere, the error offers a cleanup of that
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Conflict`] with a cleanup recovery,
    /// [`TaskLifecycleError::Bridge`] for other command failures,
    /// [`TaskLifecycleError::Slot`] when no slot is free, or a domain error
    /// when the task has no issue or is in the wrong status.
    pub async fn create_worktree(&self, task_id: &TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.task(task_id).await?;
        let issue_number = task
            .issue()
            .map(|issue| issue.number())
            .ok_or_else(|| TaskDomainError::MissingIssue(task.id().clone()))?;
        if task.status() == TaskStatus::PrCreated {
            return Err(transition_error(&task, TaskStatus::WorktreeInitializing).into());
        }
        let branch = BranchName::for_issue(issue_number, task.title())?;
        let repo_root = self.slots.root_path()?;

        let (reservation, slot) = self.reserve_workspace(&mut task, branch.clone()).await?;
        let command = WorktreeCommand::Create {
            repo_root,
            path: slot.path().to_owned(),
            branch,
            base: self.settings.default_branch.clone(),
        };
        self.open_workspace(task, reservation, &slot, &command).await
    }

    /// Removes the task's workspace, releases its slot and returns the task
    /// to the nearest status without a workspace.
    ///
    /// A task whose pull request already exists keeps its status. The status
    /// change is checked before the removal command runs.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NoWorkspace`] when no slot is bound, a
    /// domain error when the status has no workspace to close, or
    /// [`TaskLifecycleError::Bridge`] when the removal command fails, in
    /// which case the binding is kept.
    pub async fn cleanup_worktree(&self, task_id: &TaskId) -> TaskLifecycleResult<Task> {
        let task = self.task(task_id).await?;
        let slot = self.bound_slot(&task)?;
        let mut closed = task.clone();
        if !task.has_outlived_workspace() {
            closed.close_workspace(&*self.clock)?;
        }
        self.remove_workspace(&task, slot.path()).await?;
        self.slots.release(slot.id())?;
        self.repository.update(&closed).await?;
        info!(task_id = %closed.id(), slot_id = %slot.id(), status = %closed.status(), "worktree cleaned up");
        Ok(closed)
    }

    /// Forcefully removes whatever worktree occupies `path`.
    ///
    /// This is the confirmed form of [`RecoveryAction::CleanupWorktree`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Bridge`] when the removal fails.
    pub async fn force_cleanup_worktree_path(&self, path: &str) -> TaskLifecycleResult<()> {
        let command = WorktreeCommand::Remove {
            repo_root: self.slots.root_path()?,
            path: path.to_owned(),
        };
        let context = CommandContext::for_purpose("worktree-cleanup")
            .in_directory(command.working_directory())
            .with_setup_timeout();
        self.dispatcher.run_sync(&command.render(), context).await?;
        info!(path, "worktree path force-cleaned");
        Ok(())
    }

    /// Applies a new slot count and root path.
    ///
    /// Tasks whose slots were dropped return to the nearest status without a
    /// workspace. Returns those tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Slot`] for an invalid layout or
    /// [`TaskLifecycleError::Repository`] when a reverted task cannot be
    /// saved.
    pub async fn reconfigure(
        &self,
        slot_count: usize,
        root_path: &str,
    ) -> TaskLifecycleResult<Vec<Task>> {
        let dropped = self.slots.reconfigure(slot_count, root_path)?;
        let mut reverted = Vec::with_capacity(dropped.len());
        for task_id in dropped {
            let Some(mut task) = self.repository.find_by_id(&task_id).await? else {
                warn!(task_id = %task_id, "dropped slot was bound to an unknown task");
                continue;
            };
            if task.has_outlived_workspace() {
                debug!(task_id = %task_id, status = %task.status(), "slot dropped after pull request");
                continue;
            }
            if let Err(err) = task.close_workspace(&*self.clock) {
                warn!(task_id = %task_id, error = %err, "task kept its status after losing its slot");
                continue;
            }
            self.repository.update(&task).await?;
            info!(task_id = %task_id, status = %task.status(), "task unassigned by pool resize");
            reverted.push(task);
        }
        Ok(reverted)
    }

    /// Stores the combined CI status of the task's branch.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Tracker`] when the status lookup fails
    /// or a domain error when the task has no branch.
    pub async fn refresh_check_status(&self, task_id: &TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.task(task_id).await?;
        let branch = require_branch(&task)?;
        let status = self.tracker.get_commit_status(branch.as_str()).await?;
        let check = CheckStatus::from_tracker_state(&status.state);
        task.record_check_status(check, &*self.clock);
        self.repository.update(&task).await?;
        info!(task_id = %task.id(), check = ?check, "check status refreshed");
        Ok(task)
    }

    /// Opens a terminal window in the task's workspace.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NoWorkspace`] or
    /// [`TaskLifecycleError::Bridge`].
    pub async fn open_window(&self, task_id: &TaskId) -> TaskLifecycleResult<()> {
        let task = self.task(task_id).await?;
        let slot = self.bound_slot(&task)?;
        self.dispatcher
            .open_window(&window_request(&task, slot.path()))
            .await?;
        Ok(())
    }

    /// Reserves the task and a free slot for a new workspace.
    ///
    /// The reservation is persisted before returning; a failure at any step
    /// leaves neither the slot nor the task reserved.
    pub(super) async fn reserve_workspace(
        &self,
        task: &mut Task,
        branch: BranchName,
    ) -> TaskLifecycleResult<(WorktreeReservation, WorktreeSlot)> {
        let reservation = task.reserve_worktree(branch, &*self.clock)?;
        let slot = self.slots.assign_next_free(task.id())?;
        if let Err(err) = self.repository.update(task).await {
            self.release_slot_quietly(&slot);
            return Err(err.into());
        }
        info!(
            task_id = %task.id(),
            slot_id = %slot.id(),
            path = slot.path(),
            "worktree reserved"
        );
        Ok((reservation, slot))
    }

    /// Runs a workspace command for a reserved task and commits or rolls
    /// back the reservation.
    pub(super) async fn open_workspace(
        &self,
        mut task: Task,
        reservation: WorktreeReservation,
        slot: &WorktreeSlot,
        command: &WorktreeCommand,
    ) -> TaskLifecycleResult<Task> {
        let context = CommandContext::for_purpose("worktree")
            .in_directory(command.working_directory())
            .for_task(task.id().as_str())
            .with_setup_timeout();

        match self.dispatcher.run_sync(&command.render(), context).await {
            Ok(_) => {
                task.activate_worktree(reservation, &*self.clock)?;
                self.repository.update(&task).await?;
                info!(task_id = %task.id(), slot_id = %slot.id(), "worktree active");
                if self.settings.launch_window {
                    self.launch_window(&task, slot.path()).await;
                }
                Ok(task)
            }
            Err(err) => {
                warn!(
                    task_id = %task.id(),
                    slot_id = %slot.id(),
                    error = %err,
                    "worktree command failed, rolling back reservation"
                );
                task.abort_worktree(reservation, &*self.clock);
                self.release_slot_quietly(slot);
                self.repository.update(&task).await?;
                Err(classify_worktree_failure(task.id(), err))
            }
        }
    }

    pub(super) async fn remove_workspace(&self, task: &Task, path: &str) -> TaskLifecycleResult<()> {
        let command = WorktreeCommand::Remove {
            repo_root: self.slots.root_path()?,
            path: path.to_owned(),
        };
        let context = CommandContext::for_purpose("worktree-cleanup")
            .in_directory(command.working_directory())
            .for_task(task.id().as_str())
            .with_setup_timeout();
        self.dispatcher.run_sync(&command.render(), context).await?;
        Ok(())
    }

    pub(super) fn bound_slot(&self, task: &Task) -> TaskLifecycleResult<WorktreeSlot> {
        self.slots
            .slot_for_task(task.id())?
            .ok_or_else(|| TaskLifecycleError::NoWorkspace(task.id().clone()))
    }

    pub(super) fn release_slot_quietly(&self, slot: &WorktreeSlot) {
        if let Err(err) = self.slots.release(slot.id()) {
            warn!(slot_id = %slot.id(), error = %err, "slot release failed");
        }
    }

    async fn launch_window(&self, task: &Task, path: &str) {
        if let Err(err) = self.dispatcher.open_window(&window_request(task, path)).await {
            warn!(task_id = %task.id(), error = %err, "window launch failed");
        }
    }
}

pub(super) fn ensure_status(
    task: &Task,
    allowed: &[TaskStatus],
    target: TaskStatus,
) -> Result<(), TaskDomainError> {
    if allowed.contains(&task.status()) {
        Ok(())
    } else {
        Err(transition_error(task, target))
    }
}

pub(super) fn transition_error(task: &Task, target: TaskStatus) -> TaskDomainError {
    TaskDomainError::InvalidStateTransition {
        task_id: task.id().clone(),
        from: task.status(),
        to: target,
    }
}

pub(super) fn require_branch(task: &Task) -> Result<BranchName, TaskDomainError> {
    task.branch()
        .cloned()
        .ok_or_else(|| TaskDomainError::MissingBranch(task.id().clone()))
}

fn window_request(task: &Task, path: &str) -> OpenWindowRequest {
    let title = task.issue().map_or_else(
        || task.title().to_owned(),
        |issue| format!("#{} {}", issue.number(), task.title()),
    );
    OpenWindowRequest {
        worktree_path: path.to_owned(),
        title,
        startup_command: None,
        close_after_startup: None,
    }
}

/// Maps a failed workspace command to a conflict when git names the path
/// that blocks it.
fn classify_worktree_failure(task_id: &TaskId, err: BridgeError) -> TaskLifecycleError {
    let text = err.diagnostic_text();
    match blocking_path(&text) {
        Some(path) => {
            TaskLifecycleError::conflict(task_id, text, RecoveryAction::CleanupWorktree { path })
        }
        None => err.into(),
    }
}

/// Extracts the path from "already checked out at '<path>'" or
/// "'<path>' already exists". "a branch named '<branch>' already exists"
/// names a branch, not a path, and yields `None`.
pub(super) fn blocking_path(text: &str) -> Option<String> {
    if let Some((_, rest)) = text.split_once("already checked out at '") {
        return rest.split_once('\'').map(|(path, _)| path.to_owned());
    }
    let (before, _) = text.split_once("' already exists")?;
    let (lead, path) = before.rsplit_once('\'')?;
    if path.is_empty() || lead.trim_end().ends_with("branch named") {
        return None;
    }
    Some(path.to_owned())
}

#[cfg(test)]
mod tests {
    use super::blocking_path;
    use rstest::rstest;

    #[rstest]
    #[case(
        "fatal: 'task/12-fix' is already checked out at '/x'",
        Some("/x")
    )]
    #[case("fatal: '/repo-wt-1' already exists", Some("/repo-wt-1"))]
    #[case("fatal: invalid reference: main", None)]
    #[case("fatal: a branch named 'task/1-fix-login' already exists", None)]
    #[case("fatal: A branch named 'task/1-fix-login' already exists.", None)]
    #[case("already checked out at '/unterminated", None)]
    fn extracts_blocking_path(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(blocking_path(text).as_deref(), expected);
    }
}
