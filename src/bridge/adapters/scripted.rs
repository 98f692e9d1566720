//! Scripted in-memory transport for tests and dry runs.

use crate::bridge::domain::{
    BridgeEndpoint, CommandRequest, CommandResponse, HealthResponse, JobId, JobSnapshot,
    OpenWindowRequest,
};
use crate::bridge::ports::{BridgeTransport, TransportError, TransportResult};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A call observed by [`ScriptedBridgeTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `execute`
    Execute {
        /// Command URL.
        url: String,
        /// Command line.
        command: String,
        /// Asynchronous submission flag.
        run_async: bool,
    },
    /// `job_logs`
    Logs {
        /// Base URL.
        base_url: String,
        /// Job id.
        job_id: JobId,
    },
    /// `cancel_job`
    Cancel {
        /// Base URL.
        base_url: String,
        /// Job id.
        job_id: JobId,
    },
    /// `health`
    Health {
        /// Base URL.
        base_url: String,
    },
    /// `open_window`
    OpenWindow {
        /// Base URL.
        base_url: String,
        /// Workspace path.
        worktree_path: String,
    },
}

#[derive(Debug, Default)]
struct Script {
    unreachable: HashSet<String>,
    missing_routes: HashSet<String>,
    unresponsive: HashSet<String>,
    rules: Vec<(String, CommandResponse)>,
    default_response: Option<CommandResponse>,
    snapshots: VecDeque<JobSnapshot>,
    last_snapshot: Option<JobSnapshot>,
    cancel_error: Option<TransportError>,
    health: Option<HealthResponse>,
    calls: Vec<TransportCall>,
}

/// Transport that answers from a script.
///
/// Addresses can be marked unreachable, route-missing or unresponsive. Command responses
/// come from one-shot rules matched by substring, then from the default
/// response (a plain success when unset). Job snapshots are served from a
/// queue whose last entry repeats once the queue drains.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBridgeTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBridgeTransport {
    /// Creates a transport where every address answers with success.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes calls to `url` (command or base URL) fail as unreachable.
    pub fn mark_unreachable(&self, url: &str) {
        self.script().unreachable.insert(url.to_owned());
    }

    /// Makes calls to `url` (command or base URL) fail as route-not-found.
    pub fn mark_route_missing(&self, url: &str) {
        self.script().missing_routes.insert(url.to_owned());
    }

    /// Makes calls to `url` time out after the request was delivered.
    pub fn mark_unresponsive(&self, url: &str) {
        self.script().unresponsive.insert(url.to_owned());
    }

    /// Answers the next command containing `pattern` with `response`.
    pub fn respond_to(&self, pattern: &str, response: CommandResponse) {
        self.script().rules.push((pattern.to_owned(), response));
    }

    /// Sets the response for commands no rule matches.
    pub fn set_default_response(&self, response: CommandResponse) {
        self.script().default_response = Some(response);
    }

    /// Queues a job snapshot.
    pub fn push_snapshot(&self, snapshot: JobSnapshot) {
        self.script().snapshots.push_back(snapshot);
    }

    /// Makes every cancellation fail with `error`.
    pub fn fail_cancellation(&self, error: TransportError) {
        self.script().cancel_error = Some(error);
    }

    /// Sets the health response.
    pub fn set_health(&self, health: HealthResponse) {
        self.script().health = Some(health);
    }

    /// Returns every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.script().calls.clone()
    }

    /// Returns the command lines executed so far.
    #[must_use]
    pub fn executed_commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Execute { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Returns how many cancellations were requested.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, TransportCall::Cancel { .. }))
            .count()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Script {
    fn check_address(&self, url: &str) -> TransportResult<()> {
        if self.unreachable.contains(url) {
            return Err(TransportError::Unreachable(format!(
                "connection refused: {url}"
            )));
        }
        if self.missing_routes.contains(url) {
            return Err(TransportError::RouteNotFound { status: 404 });
        }
        if self.unresponsive.contains(url) {
            return Err(TransportError::NoResponse(format!(
                "operation timed out: {url}"
            )));
        }
        Ok(())
    }

    fn next_response(&mut self, command: &str) -> CommandResponse {
        if let Some(index) = self
            .rules
            .iter()
            .position(|(pattern, _)| command.contains(pattern.as_str()))
        {
            return self.rules.remove(index).1;
        }
        self.default_response
            .clone()
            .unwrap_or_else(|| CommandResponse::succeeded(""))
    }

    fn next_snapshot(&mut self) -> JobSnapshot {
        if let Some(snapshot) = self.snapshots.pop_front() {
            self.last_snapshot = Some(snapshot);
        }
        self.last_snapshot.clone().unwrap_or_default()
    }
}

#[async_trait]
impl BridgeTransport for ScriptedBridgeTransport {
    async fn execute(
        &self,
        endpoint: &BridgeEndpoint,
        request: &CommandRequest,
        _timeout: Duration,
    ) -> TransportResult<CommandResponse> {
        let mut script = self.script();
        script.calls.push(TransportCall::Execute {
            url: endpoint.command_url.clone(),
            command: request.command.clone(),
            run_async: request.run_async,
        });
        script.check_address(&endpoint.command_url)?;
        Ok(script.next_response(&request.command))
    }

    async fn job_logs(&self, base_url: &str, job_id: &JobId) -> TransportResult<JobSnapshot> {
        let mut script = self.script();
        script.calls.push(TransportCall::Logs {
            base_url: base_url.to_owned(),
            job_id: job_id.clone(),
        });
        script.check_address(base_url)?;
        Ok(script.next_snapshot())
    }

    async fn cancel_job(&self, base_url: &str, job_id: &JobId) -> TransportResult<()> {
        let mut script = self.script();
        script.calls.push(TransportCall::Cancel {
            base_url: base_url.to_owned(),
            job_id: job_id.clone(),
        });
        script.check_address(base_url)?;
        script.cancel_error.clone().map_or(Ok(()), Err)
    }

    async fn health(&self, base_url: &str) -> TransportResult<HealthResponse> {
        let mut script = self.script();
        script.calls.push(TransportCall::Health {
            base_url: base_url.to_owned(),
        });
        script.check_address(base_url)?;
        Ok(script.health.clone().unwrap_or(HealthResponse {
            ok: true,
            async_jobs: Some(0),
        }))
    }

    async fn open_window(
        &self,
        base_url: &str,
        request: &OpenWindowRequest,
    ) -> TransportResult<()> {
        let mut script = self.script();
        script.calls.push(TransportCall::OpenWindow {
            base_url: base_url.to_owned(),
            worktree_path: request.worktree_path.clone(),
        });
        script.check_address(base_url)
    }
}
