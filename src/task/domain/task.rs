//! Task aggregate root.

use super::{
    AgentRunState, BranchName, CheckStatus, IssueRef, OpenIssue, Priority, PullRequestRef,
    PullRequestSummary, TaskDomainError, TaskDraft, TaskId, TaskStatus,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

const PRIORITY_LABEL_PREFIX: &str = "priority:";

/// Artifacts captured from the most recent agent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentArtifacts {
    /// Last generated implementation text.
    pub implementation: Option<String>,
    /// Last captured execution logs.
    pub logs: Option<String>,
    /// Last executed command string.
    pub last_command: Option<String>,
    /// Outcome of the last run.
    pub run_state: AgentRunState,
}

/// Pending workspace binding returned by [`Task::reserve_worktree`].
///
/// Holds the branch until the workspace exists, and the replaced state so a
/// failed workspace command can be rolled back exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeReservation {
    branch: BranchName,
    previous_status: TaskStatus,
    previous_branch: Option<BranchName>,
}

impl WorktreeReservation {
    /// Returns the branch the workspace will check out.
    #[must_use]
    pub const fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Returns the status the task held before the reservation.
    #[must_use]
    pub const fn previous_status(&self) -> TaskStatus {
        self.previous_status
    }

    /// Returns `true` when the reservation reopens an existing branch.
    #[must_use]
    pub const fn reopens_branch(&self) -> bool {
        self.previous_branch.is_some()
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: String,
    group: String,
    priority: Priority,
    status: TaskStatus,
    issue: Option<IssueRef>,
    pull_request: Option<PullRequestRef>,
    branch: Option<BranchName>,
    merge_conflict: bool,
    review_feedback: Option<String>,
    agent: AgentArtifacts,
    check_status: Option<CheckStatus>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a `Formatted` task from a classified draft.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank.
    pub fn new(draft: TaskDraft, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        let timestamp = clock.utc();
        Ok(Self {
            id: TaskId::new(),
            title: title.to_owned(),
            description: draft.description.trim().to_owned(),
            group: draft.group.trim().to_owned(),
            priority: draft.priority,
            status: TaskStatus::Formatted,
            issue: None,
            pull_request: None,
            branch: None,
            merge_conflict: false,
            review_feedback: None,
            agent: AgentArtifacts::default(),
            check_status: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Imports an open upstream issue that has no local counterpart.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the issue title is blank.
    pub fn from_open_issue(issue: &OpenIssue, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let priority = issue
            .labels
            .iter()
            .find_map(|label| label.strip_prefix(PRIORITY_LABEL_PREFIX))
            .and_then(|value| Priority::try_from(value).ok())
            .unwrap_or_default();
        let group = issue
            .labels
            .iter()
            .find(|label| !label.starts_with(PRIORITY_LABEL_PREFIX))
            .cloned()
            .unwrap_or_default();
        let draft = TaskDraft::new(issue.title.clone(), issue.body.clone())
            .with_group(group)
            .with_priority(priority);

        let mut task = Self::new(draft, clock)?;
        task.issue = Some(issue.issue.clone());
        task.status = TaskStatus::IssueCreated;
        Ok(task)
    }

    /// Synthesises a task for an upstream pull request with no local
    /// counterpart.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidBranchName`] if the head branch is
    /// not a valid branch name, or [`TaskDomainError::EmptyTitle`] if the
    /// title is blank.
    pub fn from_remote_pull_request(
        summary: &PullRequestSummary,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        let branch = BranchName::new(summary.head_branch.clone())?;
        let mut task = Self::new(TaskDraft::new(summary.title.clone(), String::new()), clock)?;
        task.id = TaskId::for_pull_request(summary.number());
        task.issue.clone_from(&summary.linked_issue);
        task.pull_request = Some(summary.pull_request.clone());
        task.branch = Some(branch);
        task.status = if summary.merged {
            TaskStatus::PrMerged
        } else {
            TaskStatus::PrCreated
        };
        Ok(task)
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the task description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the free-text group label.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns the task priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the upstream issue, if any.
    #[must_use]
    pub const fn issue(&self) -> Option<&IssueRef> {
        self.issue.as_ref()
    }

    /// Returns the upstream pull request, if any.
    #[must_use]
    pub const fn pull_request(&self) -> Option<&PullRequestRef> {
        self.pull_request.as_ref()
    }

    /// Returns the workspace branch, if any.
    #[must_use]
    pub const fn branch(&self) -> Option<&BranchName> {
        self.branch.as_ref()
    }

    /// Returns `true` while a merge conflict awaits local resolution.
    #[must_use]
    pub const fn has_merge_conflict(&self) -> bool {
        self.merge_conflict
    }

    /// Returns the pending review feedback, if any.
    #[must_use]
    pub fn review_feedback(&self) -> Option<&str> {
        self.review_feedback.as_deref()
    }

    /// Returns the agent run artifacts.
    #[must_use]
    pub const fn agent(&self) -> &AgentArtifacts {
        &self.agent
    }

    /// Returns the last observed CI status, if any.
    #[must_use]
    pub const fn check_status(&self) -> Option<CheckStatus> {
        self.check_status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when local progress must win over upstream snapshots.
    #[must_use]
    pub const fn is_locally_in_flight(&self) -> bool {
        self.merge_conflict || self.status.is_workspace_bound()
    }

    /// Returns `true` once the branch lives on in a pull request, so losing
    /// the workspace leaves the status alone.
    #[must_use]
    pub const fn has_outlived_workspace(&self) -> bool {
        matches!(self.status, TaskStatus::PrCreated | TaskStatus::PrMerged)
    }

    /// Records the issue created upstream for a formatted task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::IssueAlreadyRecorded`] if an issue exists
    /// or [`TaskDomainError::InvalidStateTransition`] if the task is not
    /// `Formatted`.
    pub fn record_issue(&mut self, issue: IssueRef, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if self.issue.is_some() {
            return Err(TaskDomainError::IssueAlreadyRecorded(self.id.clone()));
        }
        self.ensure_transition(TaskStatus::IssueCreated)?;
        self.issue = Some(issue);
        self.status = TaskStatus::IssueCreated;
        self.touch(clock);
        Ok(())
    }

    /// Reserves the task for workspace creation on `branch`.
    ///
    /// This is the first phase of the two-phase workspace transition. The
    /// task holds no branch while `WorktreeInitializing`; the returned
    /// reservation carries it into [`Self::activate_worktree`], or feeds
    /// [`Self::abort_worktree`] on failure.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// `IssueCreated`, or `PrCreated` with a pending merge conflict.
    pub fn reserve_worktree(
        &mut self,
        branch: BranchName,
        clock: &impl Clock,
    ) -> Result<WorktreeReservation, TaskDomainError> {
        if self.status == TaskStatus::PrCreated && !self.merge_conflict {
            return Err(self.transition_error(TaskStatus::WorktreeInitializing));
        }
        self.ensure_transition(TaskStatus::WorktreeInitializing)?;

        let reservation = WorktreeReservation {
            branch,
            previous_status: self.status,
            previous_branch: self.branch.take(),
        };
        self.status = TaskStatus::WorktreeInitializing;
        self.touch(clock);
        Ok(reservation)
    }

    /// Commits a workspace reservation once the workspace exists and binds
    /// its branch to the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// `WorktreeInitializing`.
    pub fn activate_worktree(
        &mut self,
        reservation: WorktreeReservation,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::WorktreeInitializing {
            return Err(self.transition_error(TaskStatus::WorktreeActive));
        }
        self.branch = Some(reservation.branch);
        self.status = TaskStatus::WorktreeActive;
        self.agent.run_state = AgentRunState::Idle;
        self.touch(clock);
        Ok(())
    }

    /// Rolls a workspace reservation back to the state it replaced.
    pub fn abort_worktree(&mut self, reservation: WorktreeReservation, clock: &impl Clock) {
        self.status = reservation.previous_status;
        self.branch = reservation.previous_branch;
        self.touch(clock);
    }

    /// Marks an agent run as started with `command`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// `WorktreeActive`.
    pub fn start_agent_run(
        &mut self,
        command: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::WorktreeActive {
            return Err(self.transition_error(TaskStatus::Implemented));
        }
        self.agent.last_command = Some(command.into());
        self.agent.run_state = AgentRunState::Running;
        self.touch(clock);
        Ok(())
    }

    /// Records a successful agent run and advances to `Implemented`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyAgentOutput`] without mutating the
    /// task when `output` is blank, or
    /// [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// `WorktreeActive`.
    pub fn record_agent_success(
        &mut self,
        output: &str,
        logs: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if output.trim().is_empty() {
            return Err(TaskDomainError::EmptyAgentOutput(self.id.clone()));
        }
        if self.status != TaskStatus::WorktreeActive {
            return Err(self.transition_error(TaskStatus::Implemented));
        }
        self.agent.implementation = Some(output.to_owned());
        self.agent.logs = Some(logs.into());
        self.agent.run_state = AgentRunState::Succeeded;
        self.review_feedback = None;
        self.status = TaskStatus::Implemented;
        self.touch(clock);
        Ok(())
    }

    /// Records diagnostics for a failed or cancelled agent run.
    ///
    /// The status never changes. `outcome` values other than `Failed` and
    /// `Cancelled` are recorded as `Failed`.
    pub fn record_agent_failure(
        &mut self,
        logs: impl Into<String>,
        outcome: AgentRunState,
        clock: &impl Clock,
    ) {
        self.agent.logs = Some(logs.into());
        self.agent.run_state = match outcome {
            AgentRunState::Cancelled => AgentRunState::Cancelled,
            _ => AgentRunState::Failed,
        };
        self.touch(clock);
    }

    /// Attaches review feedback and returns the task to `WorktreeActive`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyFeedback`] for blank feedback or
    /// [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// `WorktreeActive` or `Implemented`.
    pub fn request_changes(
        &mut self,
        feedback: &str,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        let trimmed = feedback.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyFeedback);
        }
        self.ensure_transition(TaskStatus::WorktreeActive)?;
        self.review_feedback = Some(trimmed.to_owned());
        self.agent.run_state = AgentRunState::Idle;
        self.status = TaskStatus::WorktreeActive;
        self.touch(clock);
        Ok(())
    }

    /// Marks the branch as pushed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::MissingBranch`] when no branch is set or
    /// [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// `Implemented`.
    pub fn mark_pushed(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if self.branch.is_none() {
            return Err(TaskDomainError::MissingBranch(self.id.clone()));
        }
        self.ensure_transition(TaskStatus::Pushed)?;
        self.status = TaskStatus::Pushed;
        self.touch(clock);
        Ok(())
    }

    /// Records the pull request opened for the task.
    ///
    /// Recording the same pull request again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::PullRequestAlreadyRecorded`] for a
    /// different pull request, or
    /// [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// `Implemented` or `Pushed`.
    pub fn record_pull_request(
        &mut self,
        pull_request: PullRequestRef,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if let Some(existing) = &self.pull_request {
            if existing.number() == pull_request.number() && self.status == TaskStatus::PrCreated {
                return Ok(());
            }
            if existing.number() != pull_request.number() {
                return Err(TaskDomainError::PullRequestAlreadyRecorded(self.id.clone()));
            }
        }
        if !matches!(self.status, TaskStatus::Implemented | TaskStatus::Pushed) {
            return Err(self.transition_error(TaskStatus::PrCreated));
        }
        self.pull_request = Some(pull_request);
        self.status = TaskStatus::PrCreated;
        self.touch(clock);
        Ok(())
    }

    /// Flags a content conflict detected while merging.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::MissingPullRequest`] without a pull
    /// request or [`TaskDomainError::InvalidStateTransition`] unless the task
    /// is `PrCreated`.
    pub fn mark_merge_conflict(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_open_pull_request(TaskStatus::PrCreated)?;
        self.merge_conflict = true;
        self.touch(clock);
        Ok(())
    }

    /// Records a successful merge.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::MissingPullRequest`] without a pull
    /// request or [`TaskDomainError::InvalidStateTransition`] unless the task
    /// is `PrCreated`.
    pub fn mark_merged(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_open_pull_request(TaskStatus::PrMerged)?;
        self.merge_conflict = false;
        self.status = TaskStatus::PrMerged;
        self.touch(clock);
        Ok(())
    }

    /// Completes a local conflict resolution and returns to `PrCreated`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NoMergeConflict`] without a pending
    /// conflict, [`TaskDomainError::MissingPullRequest`] without a pull
    /// request, or [`TaskDomainError::InvalidStateTransition`] unless the
    /// task holds an active workspace.
    pub fn finish_conflict_resolution(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if !self.merge_conflict {
            return Err(TaskDomainError::NoMergeConflict(self.id.clone()));
        }
        if self.pull_request.is_none() {
            return Err(TaskDomainError::MissingPullRequest(self.id.clone()));
        }
        if self.status == TaskStatus::WorktreeInitializing {
            return Err(self.transition_error(TaskStatus::PrCreated));
        }
        self.ensure_transition(TaskStatus::PrCreated)?;
        self.merge_conflict = false;
        self.status = TaskStatus::PrCreated;
        self.touch(clock);
        Ok(())
    }

    /// Returns the task to the nearest status without a workspace.
    ///
    /// A task reopened for conflict resolution returns to `PrCreated` and
    /// keeps its conflict flag and branch; any other task returns to
    /// `IssueCreated` and forgets its branch.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] when the current
    /// status has no workspace to close.
    pub fn close_workspace(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        let reopened_for_conflict = self.merge_conflict && self.pull_request.is_some();
        let target = if reopened_for_conflict {
            TaskStatus::PrCreated
        } else {
            TaskStatus::IssueCreated
        };
        if self.status == TaskStatus::Pushed && reopened_for_conflict {
            return Err(self.transition_error(target));
        }
        self.ensure_transition(target)?;
        if !reopened_for_conflict {
            self.branch = None;
        }
        self.agent.run_state = AgentRunState::Idle;
        self.status = target;
        self.touch(clock);
        Ok(())
    }

    /// Stores the latest combined CI status.
    pub fn record_check_status(&mut self, status: CheckStatus, clock: &impl Clock) {
        self.check_status = Some(status);
        self.touch(clock);
    }

    /// Folds an upstream pull request snapshot into the task.
    ///
    /// The pull request reference and a missing issue link are always
    /// refreshed. The branch and status are only overwritten when the task
    /// is not locally in flight, and a merged task is never downgraded.
    /// Returns `true` when anything changed.
    pub fn apply_remote_pull_request(
        &mut self,
        summary: &PullRequestSummary,
        clock: &impl Clock,
    ) -> bool {
        let mut changed = false;

        if self.pull_request.as_ref() != Some(&summary.pull_request) {
            self.pull_request = Some(summary.pull_request.clone());
            changed = true;
        }
        if self.issue.is_none() && summary.linked_issue.is_some() {
            self.issue.clone_from(&summary.linked_issue);
            changed = true;
        }

        if !self.is_locally_in_flight() {
            if let Ok(branch) = BranchName::new(summary.head_branch.clone()) {
                if self.branch.as_ref() != Some(&branch) {
                    self.branch = Some(branch);
                    changed = true;
                }
            }
            let target = if summary.merged || self.status == TaskStatus::PrMerged {
                TaskStatus::PrMerged
            } else {
                TaskStatus::PrCreated
            };
            if self.status != target {
                self.status = target;
                changed = true;
            }
        }

        if changed {
            self.touch(clock);
        }
        changed
    }

    fn ensure_open_pull_request(&self, target: TaskStatus) -> Result<(), TaskDomainError> {
        if self.pull_request.is_none() {
            return Err(TaskDomainError::MissingPullRequest(self.id.clone()));
        }
        if self.status != TaskStatus::PrCreated {
            return Err(self.transition_error(target));
        }
        Ok(())
    }

    fn ensure_transition(&self, target: TaskStatus) -> Result<(), TaskDomainError> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(self.transition_error(target))
        }
    }

    fn transition_error(&self, target: TaskStatus) -> TaskDomainError {
        TaskDomainError::InvalidStateTransition {
            task_id: self.id.clone(),
            from: self.status,
            to: target,
        }
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
