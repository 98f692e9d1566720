//! In-memory repository for task lifecycle tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{BranchName, IssueNumber, PullRequestNumber, Task, TaskId},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    issue_index: HashMap<IssueNumber, TaskId>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TaskRepositoryResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> TaskRepositoryResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

fn issue_number(task: &Task) -> Option<IssueNumber> {
    task.issue().map(|issue| issue.number())
}

/// Rejects an issue number already owned by a different task.
fn ensure_issue_free(state: &InMemoryTaskState, task: &Task) -> TaskRepositoryResult<()> {
    let Some(number) = issue_number(task) else {
        return Ok(());
    };
    match state.issue_index.get(&number) {
        Some(owner) if owner != task.id() => Err(TaskRepositoryError::DuplicateIssue(number)),
        _ => Ok(()),
    }
}

fn index_issue(state: &mut InMemoryTaskState, task: &Task) {
    if let Some(number) = issue_number(task) {
        state.issue_index.insert(number, task.id().clone());
    }
}

fn unindex_issue(state: &mut InMemoryTaskState, task_id: &TaskId) {
    state.issue_index.retain(|_, owner| owner != task_id);
}

/// Returns tasks sorted by creation time, then id, for stable listings.
fn sorted(tasks: impl Iterator<Item = Task>) -> Vec<Task> {
    let mut listed: Vec<Task> = tasks.collect();
    listed.sort_by(|left, right| {
        left.created_at()
            .cmp(&right.created_at())
            .then_with(|| left.id().cmp(right.id()))
    });
    listed
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id().clone()));
        }
        ensure_issue_free(&state, task)?;

        index_issue(&mut state, task);
        state.tasks.insert(task.id().clone(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if !state.tasks.contains_key(task.id()) {
            return Err(TaskRepositoryError::NotFound(task.id().clone()));
        }
        ensure_issue_free(&state, task)?;

        // Drop the old issue index entry before adding the updated one.
        unindex_issue(&mut state, task.id());
        index_issue(&mut state, task);
        state.tasks.insert(task.id().clone(), task.clone());
        Ok(())
    }

    async fn remove(&self, id: &TaskId) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        unindex_issue(&mut state, id);
        state.tasks.remove(id);
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> TaskRepositoryResult<Option<Task>> {
        Ok(self.read()?.tasks.get(id).cloned())
    }

    async fn find_by_issue_number(
        &self,
        number: IssueNumber,
    ) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        let task = state
            .issue_index
            .get(&number)
            .and_then(|task_id| state.tasks.get(task_id))
            .cloned();
        Ok(task)
    }

    async fn find_by_pull_request_number(
        &self,
        number: PullRequestNumber,
    ) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        Ok(state
            .tasks
            .values()
            .find(|task| task.pull_request().is_some_and(|pr| pr.number() == number))
            .cloned())
    }

    async fn find_by_branch(&self, branch: &BranchName) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        Ok(state
            .tasks
            .values()
            .find(|task| task.branch() == Some(branch))
            .cloned())
    }

    async fn list_all(&self) -> TaskRepositoryResult<Vec<Task>> {
        Ok(sorted(self.read()?.tasks.values().cloned()))
    }

    async fn replace_all(&self, tasks: Vec<Task>) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        state.tasks.clear();
        state.issue_index.clear();
        for task in tasks {
            index_issue(&mut state, &task);
            state.tasks.insert(task.id().clone(), task);
        }
        Ok(())
    }
}
