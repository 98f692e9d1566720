//! Agent runs inside a task's workspace.

use super::error::{TaskLifecycleError, TaskLifecycleResult};
use super::lifecycle::{TaskLifecycleService, ensure_status};
use crate::bridge::domain::{BridgeError, BridgeJob, CommandContext, JobHandle, JobId};
use crate::bridge::ports::BridgeTransport;
use crate::task::domain::{AgentRunState, Task, TaskId, TaskStatus};
use crate::task::ports::{IssueTracker, TaskRepository};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct RunningAgent {
    job_id: Option<JobId>,
    cancelled: bool,
}

/// Agent runs currently in flight, keyed by task.
///
/// An entry exists from the moment a run is requested until its outcome is
/// recorded, so a cancellation that arrives before the bridge returns a job
/// id is still honoured.
#[derive(Debug, Default)]
pub(super) struct AgentRunRegistry {
    runs: Mutex<HashMap<TaskId, RunningAgent>>,
}

impl AgentRunRegistry {
    fn begin(&self, task_id: &TaskId) -> TaskLifecycleResult<()> {
        let mut runs = self.runs();
        if runs.contains_key(task_id) {
            return Err(TaskLifecycleError::AgentRunInProgress(task_id.clone()));
        }
        runs.insert(task_id.clone(), RunningAgent::default());
        Ok(())
    }

    /// Records the job id; returns `true` if cancellation was already
    /// requested.
    fn attach_job(&self, task_id: &TaskId, job_id: &JobId) -> bool {
        self.runs().get_mut(task_id).is_some_and(|run| {
            run.job_id = Some(job_id.clone());
            run.cancelled
        })
    }

    fn request_cancel(&self, task_id: &TaskId) -> TaskLifecycleResult<Option<JobId>> {
        let mut runs = self.runs();
        let run = runs
            .get_mut(task_id)
            .ok_or_else(|| TaskLifecycleError::NoAgentRun(task_id.clone()))?;
        run.cancelled = true;
        Ok(run.job_id.clone())
    }

    /// Removes the entry; returns `true` if the run was cancelled.
    fn finish(&self, task_id: &TaskId) -> bool {
        self.runs()
            .remove(task_id)
            .is_some_and(|run| run.cancelled)
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<TaskId, RunningAgent>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct AgentOutput {
    stdout: String,
    logs: String,
}

impl<R, I, T, C> TaskLifecycleService<R, I, T, C>
where
    R: TaskRepository,
    I: IssueTracker,
    T: BridgeTransport,
    C: Clock + Send + Sync,
{
    /// Runs the agent in the task's workspace.
    ///
    /// Every poll of the bridge job is forwarded to `on_progress`. The task
    /// advances to `Implemented` only when the run completes and produces
    /// output; otherwise it stays in `WorktreeActive` with the failure logs
    /// recorded.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Bridge`] when the run fails or times
    /// out, [`TaskLifecycleError::AgentRunCancelled`] after a cancellation,
    /// and a domain error for empty output or a task that is not
    /// `WorktreeActive`.
    pub async fn run_agent<F>(&self, task_id: &TaskId, on_progress: F) -> TaskLifecycleResult<Task>
    where
        F: FnMut(&BridgeJob) + Send,
    {
        let mut task = self.task(task_id).await?;
        let slot = self.bound_slot(&task)?;
        ensure_status(&task, &[TaskStatus::WorktreeActive], TaskStatus::Implemented)?;
        let command = self.render_agent_command(&task, slot.path())?;

        self.agent_runs.begin(task.id())?;
        if let Err(err) = self.start_run(&mut task, &command).await {
            self.agent_runs.finish(task.id());
            return Err(err);
        }
        let context = CommandContext::for_purpose("agent")
            .in_directory(slot.path())
            .for_task(task.id().as_str());
        let outcome = self.execute_agent(task.id(), &command, context, on_progress).await;
        let cancelled = self.agent_runs.finish(task.id());
        self.record_agent_outcome(task, outcome, cancelled).await
    }

    /// Cancels the agent run in flight for the task.
    ///
    /// Cancellation is best effort: a bridge failure is logged and the run
    /// still records a cancelled outcome.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NoAgentRun`] when nothing is running.
    pub async fn cancel_agent_run(&self, task_id: &TaskId) -> TaskLifecycleResult<()> {
        match self.agent_runs.request_cancel(task_id)? {
            Some(job_id) => {
                info!(task_id = %task_id, job_id = %job_id, "cancelling agent run");
                self.dispatcher.cancel_best_effort(&job_id).await;
            }
            None => debug!(task_id = %task_id, "agent cancellation queued before job submission"),
        }
        Ok(())
    }

    /// Attaches review feedback and returns the task to `WorktreeActive`.
    ///
    /// # Errors
    ///
    /// Returns a domain error for blank feedback or a task that is neither
    /// `WorktreeActive` nor `Implemented`.
    pub async fn request_changes(
        &self,
        task_id: &TaskId,
        feedback: &str,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.task(task_id).await?;
        task.request_changes(feedback, &*self.clock)?;
        self.repository.update(&task).await?;
        info!(task_id = %task.id(), "changes requested");
        Ok(task)
    }

    fn render_agent_command(&self, task: &Task, path: &str) -> Result<String, BridgeError> {
        let branch = task.branch().map(ToString::to_string);
        let issue_number = task.issue().map(|issue| issue.number().to_string());
        let prompt = agent_prompt(task);
        self.settings.agent_command.render(|name| match name {
            "worktree_path" => Some(path.to_owned()),
            "branch" => branch.clone(),
            "title" => Some(task.title().to_owned()),
            "description" => Some(task.description().to_owned()),
            "feedback" => task.review_feedback().map(str::to_owned),
            "issue_number" => issue_number.clone(),
            "task_id" => Some(task.id().to_string()),
            "prompt" => Some(prompt.clone()),
            _ => None,
        })
    }

    async fn start_run(&self, task: &mut Task, command: &str) -> TaskLifecycleResult<()> {
        task.start_agent_run(command, &*self.clock)?;
        self.repository.update(task).await?;
        info!(task_id = %task.id(), "agent run started");
        Ok(())
    }

    async fn execute_agent<F>(
        &self,
        task_id: &TaskId,
        command: &str,
        context: CommandContext,
        on_progress: F,
    ) -> TaskLifecycleResult<AgentOutput>
    where
        F: FnMut(&BridgeJob) + Send,
    {
        match self.dispatcher.run_async(command, context).await? {
            JobHandle::Completed(output) => Ok(AgentOutput {
                logs: join_logs(&output.stdout, &output.stderr),
                stdout: output.stdout,
            }),
            JobHandle::Pending(job) => {
                if self.agent_runs.attach_job(task_id, &job.job_id) {
                    self.dispatcher.cancel_best_effort(&job.job_id).await;
                    return Err(TaskLifecycleError::AgentRunCancelled(task_id.clone()));
                }
                debug!(task_id = %task_id, job_id = %job.job_id, "polling agent job");
                let finished = self.poller.wait(&job, on_progress).await?;
                Ok(AgentOutput {
                    stdout: finished.stdout().to_owned(),
                    logs: join_logs(finished.stdout(), finished.stderr()),
                })
            }
        }
    }

    async fn record_agent_outcome(
        &self,
        mut task: Task,
        outcome: TaskLifecycleResult<AgentOutput>,
        cancelled: bool,
    ) -> TaskLifecycleResult<Task> {
        let clock = &*self.clock;
        let failure = match outcome {
            Ok(output) if !cancelled => {
                match task.record_agent_success(&output.stdout, output.logs.clone(), clock) {
                    Ok(()) => {
                        self.repository.update(&task).await?;
                        info!(task_id = %task.id(), "agent run implemented task");
                        return Ok(task);
                    }
                    Err(err) => {
                        task.record_agent_failure(output.logs, AgentRunState::Failed, clock);
                        TaskLifecycleError::from(err)
                    }
                }
            }
            Ok(output) => {
                task.record_agent_failure(output.logs, AgentRunState::Cancelled, clock);
                TaskLifecycleError::AgentRunCancelled(task.id().clone())
            }
            Err(err) => {
                let state = if cancelled {
                    AgentRunState::Cancelled
                } else {
                    AgentRunState::Failed
                };
                task.record_agent_failure(failure_logs(&err), state, clock);
                if cancelled {
                    TaskLifecycleError::AgentRunCancelled(task.id().clone())
                } else {
                    err
                }
            }
        };
        self.repository.update(&task).await?;
        warn!(
            task_id = %task.id(),
            run_state = ?task.agent().run_state,
            error = %failure,
            "agent run did not implement task"
        );
        Err(failure)
    }
}

fn agent_prompt(task: &Task) -> String {
    let mut prompt = task.title().to_owned();
    if !task.description().is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(task.description());
    }
    if let Some(feedback) = task.review_feedback() {
        prompt.push_str("\n\nReview feedback:\n");
        prompt.push_str(feedback);
    }
    prompt
}

fn join_logs(stdout: &str, stderr: &str) -> String {
    if stderr.trim().is_empty() {
        stdout.to_owned()
    } else {
        format!("{stdout}\n--- stderr ---\n{stderr}")
    }
}

fn failure_logs(err: &TaskLifecycleError) -> String {
    match err {
        TaskLifecycleError::Bridge(bridge) => bridge.diagnostic_text(),
        other => other.to_string(),
    }
}
