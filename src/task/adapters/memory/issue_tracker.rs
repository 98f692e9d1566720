//! In-memory issue tracker with scripted failures.

use crate::task::domain::{
    BranchName, IssueDraft, IssueNumber, IssueRef, OpenIssue, PullRequestDetails,
    PullRequestDraft, PullRequestNumber, PullRequestRef, PullRequestSummary, TaskDomainError,
};
use crate::task::ports::{CommitStatus, IssueTracker, IssueTrackerError, IssueTrackerResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

const TRACKER_BASE_URL: &str = "https://tracker.test/acme/widgets";
const INITIAL_SHA: &str = "0000000000000000000000000000000000000000";

/// Tracker operation names, used to script failures and inspect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerOperation {
    /// `create_issue`
    CreateIssue,
    /// `list_open_issues`
    ListOpenIssues,
    /// `create_branch`
    CreateBranch,
    /// `get_branch_head_sha`
    GetBranchHeadSha,
    /// `commit_file`
    CommitFile,
    /// `create_pull_request`
    CreatePullRequest,
    /// `merge_pull_request`
    MergePullRequest,
    /// `list_open_pull_requests`
    ListOpenPullRequests,
    /// `list_merged_pull_requests`
    ListMergedPullRequests,
    /// `get_pull_request_details`
    GetPullRequestDetails,
    /// `get_commit_status`
    GetCommitStatus,
}

/// A file committed through [`IssueTracker::commit_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedFile {
    /// Target branch.
    pub branch: BranchName,
    /// Repository path.
    pub path: String,
    /// File content.
    pub content: String,
    /// Commit message.
    pub message: String,
}

#[derive(Debug)]
struct TrackerState {
    next_number: u64,
    open_issues: Vec<OpenIssue>,
    open_pull_requests: Vec<PullRequestSummary>,
    merged_pull_requests: Vec<PullRequestSummary>,
    details: HashMap<PullRequestNumber, PullRequestDetails>,
    statuses: HashMap<String, String>,
    branches: HashMap<String, String>,
    commits: Vec<CommittedFile>,
    failures: HashMap<TrackerOperation, VecDeque<IssueTrackerError>>,
    calls: Vec<TrackerOperation>,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            next_number: 1,
            open_issues: Vec::new(),
            open_pull_requests: Vec::new(),
            merged_pull_requests: Vec::new(),
            details: HashMap::new(),
            statuses: HashMap::new(),
            branches: HashMap::from([("main".to_owned(), INITIAL_SHA.to_owned())]),
            commits: Vec::new(),
            failures: HashMap::new(),
            calls: Vec::new(),
        }
    }
}

/// Thread-safe fake tracker.
///
/// Issues and pull requests share one number sequence, as on the real
/// tracker. Failures queued with [`Self::fail_next`] are returned once, in
/// order, by the matching operation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIssueTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl InMemoryIssueTracker {
    /// Creates a tracker whose only branch is `main`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `error` for the next call of `operation`.
    pub fn fail_next(&self, operation: TrackerOperation, error: IssueTrackerError) {
        self.with_state(|state| {
            state.failures.entry(operation).or_default().push_back(error);
        });
    }

    /// Adds an open issue and returns its reference.
    ///
    /// # Errors
    ///
    /// Returns [`IssueTrackerError::Validation`] if the number sequence is
    /// exhausted.
    pub fn open_issue(&self, title: &str, body: &str) -> IssueTrackerResult<IssueRef> {
        self.with_state(|state| {
            let issue = next_issue_ref(state)?;
            state.open_issues.push(OpenIssue {
                issue: issue.clone(),
                title: title.to_owned(),
                body: body.to_owned(),
                labels: Vec::new(),
            });
            Ok(issue)
        })
    }

    /// Removes an issue from the open list.
    pub fn close_issue(&self, number: IssueNumber) {
        self.with_state(|state| {
            state
                .open_issues
                .retain(|open| open.issue.number() != number);
        });
    }

    /// Adds an open pull request from `head_branch` and returns its summary.
    ///
    /// # Errors
    ///
    /// Returns [`IssueTrackerError::Validation`] if the number sequence is
    /// exhausted.
    pub fn open_pull_request(
        &self,
        title: &str,
        head_branch: &str,
        linked_issue: Option<IssueRef>,
    ) -> IssueTrackerResult<PullRequestSummary> {
        self.with_state(|state| {
            let pull_request = next_pull_request_ref(state)?;
            let summary = PullRequestSummary {
                pull_request,
                title: title.to_owned(),
                head_branch: head_branch.to_owned(),
                linked_issue,
                merged: false,
            };
            state.open_pull_requests.push(summary.clone());
            Ok(summary)
        })
    }

    /// Marks an open pull request as merged outside the orchestrator.
    pub fn merge_remotely(&self, number: PullRequestNumber) {
        self.with_state(|state| move_to_merged(state, number));
    }

    /// Sets the details returned for a pull request.
    pub fn set_pull_request_details(&self, number: PullRequestNumber, details: PullRequestDetails) {
        self.with_state(|state| {
            state.details.insert(number, details);
        });
    }

    /// Sets the combined commit status of `reference`.
    pub fn set_commit_status(&self, reference: &str, status: &str) {
        self.with_state(|state| {
            state.statuses.insert(reference.to_owned(), status.to_owned());
        });
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TrackerOperation> {
        self.with_state(|state| state.calls.clone())
    }

    /// Returns every file committed so far.
    #[must_use]
    pub fn commits(&self) -> Vec<CommittedFile> {
        self.with_state(|state| state.commits.clone())
    }

    /// Returns the open issues.
    #[must_use]
    pub fn open_issues(&self) -> Vec<OpenIssue> {
        self.with_state(|state| state.open_issues.clone())
    }

    /// Returns the merged pull requests.
    #[must_use]
    pub fn merged_pull_requests(&self) -> Vec<PullRequestSummary> {
        self.with_state(|state| state.merged_pull_requests.clone())
    }

    /// Returns `true` when `branch` exists.
    #[must_use]
    pub fn has_branch(&self, branch: &str) -> bool {
        self.with_state(|state| state.branches.contains_key(branch))
    }

    fn with_state<T>(&self, action: impl FnOnce(&mut TrackerState) -> T) -> T {
        let mut guard = lock(&self.state);
        action(&mut guard)
    }

    /// Records the call and pops a scripted failure, if any.
    fn begin(&self, operation: TrackerOperation) -> IssueTrackerResult<MutexGuard<'_, TrackerState>> {
        let mut guard = lock(&self.state);
        guard.calls.push(operation);
        let scripted = guard
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(error) => Err(error),
            None => Ok(guard),
        }
    }
}

/// Locks the state, recovering from poisoning since the fake holds no
/// invariants a panicking test could break.
fn lock(state: &Mutex<TrackerState>) -> MutexGuard<'_, TrackerState> {
    state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn next_number(state: &mut TrackerState) -> u64 {
    let number = state.next_number;
    state.next_number = number.saturating_add(1);
    number
}

fn next_issue_ref(state: &mut TrackerState) -> IssueTrackerResult<IssueRef> {
    let value = next_number(state);
    let number = IssueNumber::new(value).map_err(invalid_number)?;
    Ok(IssueRef::new(number, format!("{TRACKER_BASE_URL}/issues/{value}")))
}

fn next_pull_request_ref(state: &mut TrackerState) -> IssueTrackerResult<PullRequestRef> {
    let value = next_number(state);
    let number = PullRequestNumber::new(value).map_err(invalid_number)?;
    Ok(PullRequestRef::new(
        number,
        format!("{TRACKER_BASE_URL}/pull/{value}"),
    ))
}

fn invalid_number(err: TaskDomainError) -> IssueTrackerError {
    IssueTrackerError::Validation(err.to_string())
}

fn move_to_merged(state: &mut TrackerState, number: PullRequestNumber) {
    if let Some(index) = state
        .open_pull_requests
        .iter()
        .position(|summary| summary.number() == number)
    {
        let mut summary = state.open_pull_requests.remove(index);
        summary.merged = true;
        state.merged_pull_requests.push(summary);
    }
}

#[async_trait]
impl IssueTracker for InMemoryIssueTracker {
    async fn create_issue(&self, draft: &IssueDraft) -> IssueTrackerResult<IssueRef> {
        let mut state = self.begin(TrackerOperation::CreateIssue)?;
        let issue = next_issue_ref(&mut state)?;
        state.open_issues.push(OpenIssue {
            issue: issue.clone(),
            title: draft.title.clone(),
            body: draft.body.clone(),
            labels: draft.labels.clone(),
        });
        Ok(issue)
    }

    async fn list_open_issues(&self) -> IssueTrackerResult<Vec<OpenIssue>> {
        let state = self.begin(TrackerOperation::ListOpenIssues)?;
        Ok(state.open_issues.clone())
    }

    async fn create_branch(&self, branch: &BranchName, base_sha: &str) -> IssueTrackerResult<()> {
        let mut state = self.begin(TrackerOperation::CreateBranch)?;
        if state.branches.contains_key(branch.as_str()) {
            return Err(IssueTrackerError::Validation(format!(
                "Reference already exists: {branch}"
            )));
        }
        state
            .branches
            .insert(branch.as_str().to_owned(), base_sha.to_owned());
        Ok(())
    }

    async fn get_branch_head_sha(&self, branch: &str) -> IssueTrackerResult<String> {
        let state = self.begin(TrackerOperation::GetBranchHeadSha)?;
        state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| IssueTrackerError::NotFound(format!("branch {branch}")))
    }

    async fn commit_file(
        &self,
        branch: &BranchName,
        path: &str,
        content: &str,
        message: &str,
    ) -> IssueTrackerResult<()> {
        let mut state = self.begin(TrackerOperation::CommitFile)?;
        if !state.branches.contains_key(branch.as_str()) {
            return Err(IssueTrackerError::NotFound(format!("branch {branch}")));
        }
        state.commits.push(CommittedFile {
            branch: branch.clone(),
            path: path.to_owned(),
            content: content.to_owned(),
            message: message.to_owned(),
        });
        Ok(())
    }

    async fn create_pull_request(
        &self,
        draft: &PullRequestDraft,
    ) -> IssueTrackerResult<PullRequestRef> {
        let mut state = self.begin(TrackerOperation::CreatePullRequest)?;
        let pull_request = next_pull_request_ref(&mut state)?;
        state.details.insert(
            pull_request.number(),
            PullRequestDetails {
                base: draft.base.clone(),
                head: draft.head.as_str().to_owned(),
                mergeable_state: "clean".to_owned(),
            },
        );
        state.open_pull_requests.push(PullRequestSummary {
            pull_request: pull_request.clone(),
            title: draft.title.clone(),
            head_branch: draft.head.as_str().to_owned(),
            linked_issue: None,
            merged: false,
        });
        Ok(pull_request)
    }

    async fn merge_pull_request(
        &self,
        number: PullRequestNumber,
        _title: &str,
    ) -> IssueTrackerResult<()> {
        let mut state = self.begin(TrackerOperation::MergePullRequest)?;
        if !state
            .open_pull_requests
            .iter()
            .any(|summary| summary.number() == number)
        {
            return Err(IssueTrackerError::NotFound(format!("pull request #{number}")));
        }
        move_to_merged(&mut state, number);
        Ok(())
    }

    async fn list_open_pull_requests(&self) -> IssueTrackerResult<Vec<PullRequestSummary>> {
        let state = self.begin(TrackerOperation::ListOpenPullRequests)?;
        Ok(state.open_pull_requests.clone())
    }

    async fn list_merged_pull_requests(&self) -> IssueTrackerResult<Vec<PullRequestSummary>> {
        let state = self.begin(TrackerOperation::ListMergedPullRequests)?;
        Ok(state.merged_pull_requests.clone())
    }

    async fn get_pull_request_details(
        &self,
        number: PullRequestNumber,
    ) -> IssueTrackerResult<PullRequestDetails> {
        let state = self.begin(TrackerOperation::GetPullRequestDetails)?;
        state
            .details
            .get(&number)
            .cloned()
            .ok_or_else(|| IssueTrackerError::NotFound(format!("pull request #{number}")))
    }

    async fn get_commit_status(&self, reference: &str) -> IssueTrackerResult<CommitStatus> {
        let state = self.begin(TrackerOperation::GetCommitStatus)?;
        let status = state
            .statuses
            .get(reference)
            .cloned()
            .unwrap_or_else(|| "pending".to_owned());
        Ok(CommitStatus { state: status })
    }
}
