//! Bridge wire protocol.
//!
//! Field names follow the bridge's camelCase JSON.

use super::JobId;
use serde::{Deserialize, Serialize};

/// How the bridge should run a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandMode {
    /// Run through the user's shell.
    #[default]
    Shell,
}

/// Which network timeout applies to a command call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Short single command.
    #[default]
    Command,
    /// Workspace setup, which may check out a large tree.
    Setup,
}

/// Context sent alongside a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandContext {
    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Task the command belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Short label shown in bridge logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Network timeout class; never sent.
    #[serde(skip)]
    pub timeout: TimeoutClass,
}

impl CommandContext {
    /// Creates a context for `purpose`.
    #[must_use]
    pub fn for_purpose(purpose: impl Into<String>) -> Self {
        Self {
            purpose: Some(purpose.into()),
            ..Self::default()
        }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn in_directory(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Sets the owning task.
    #[must_use]
    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Uses the workspace setup timeout.
    #[must_use]
    pub const fn with_setup_timeout(mut self) -> Self {
        self.timeout = TimeoutClass::Setup;
        self
    }
}

/// Body of `POST <endpoint>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    /// Shell command line.
    pub command: String,
    /// Execution mode.
    pub mode: CommandMode,
    /// Ask the bridge to return a job id instead of blocking.
    #[serde(rename = "async", skip_serializing_if = "std::ops::Not::not")]
    pub run_async: bool,
    /// Command context, flattened into the body.
    #[serde(flatten)]
    pub context: CommandContext,
}

impl CommandRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(command: impl Into<String>, context: CommandContext, run_async: bool) -> Self {
        Self {
            command: command.into(),
            mode: CommandMode::Shell,
            run_async,
            context,
        }
    }
}

/// Response of `POST <endpoint>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandResponse {
    /// Explicit success flag.
    pub success: Option<bool>,
    /// Process exit code.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Job id of an asynchronous submission.
    pub job_id: Option<JobId>,
    /// Bridge error message.
    pub error: Option<String>,
}

impl CommandResponse {
    /// A completed successful command.
    #[must_use]
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            success: Some(true),
            exit_code: Some(0),
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// A completed failed command.
    #[must_use]
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// An accepted asynchronous submission.
    #[must_use]
    pub fn accepted(job_id: JobId) -> Self {
        Self {
            success: Some(true),
            job_id: Some(job_id),
            ..Self::default()
        }
    }

    /// Returns `true` unless the response carries a failure flag, a non-zero
    /// exit code or, without a flag, an error message.
    #[must_use]
    pub fn is_success(&self) -> bool {
        let exit_ok = self.exit_code.is_none_or(|code| code == 0);
        match self.success {
            Some(flag) => flag && exit_ok,
            None => exit_ok && self.error.is_none(),
        }
    }

    /// Returns `true` when the body looks like a command result rather than
    /// an unrelated error page.
    #[must_use]
    pub const fn carries_result(&self) -> bool {
        self.success.is_some()
            || self.exit_code.is_some()
            || self.job_id.is_some()
            || self.error.is_some()
    }
}

/// Response of `GET <base>/logs?jobId=<id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSnapshot {
    /// Completion flag.
    pub done: bool,
    /// Explicit success flag.
    pub success: Option<bool>,
    /// Exit code once finished.
    pub exit_code: Option<i32>,
    /// Cumulative standard output.
    pub stdout: String,
    /// Cumulative standard error.
    pub stderr: String,
    /// Process id.
    pub pid: Option<u32>,
    /// Start time in Unix milliseconds.
    pub started_at: Option<i64>,
    /// Last output time in Unix milliseconds.
    pub updated_at: Option<i64>,
}

/// Body of `POST <base>/cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    /// Job to cancel.
    pub job_id: JobId,
}

/// Response of `GET <base>/health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthResponse {
    /// Whether the bridge considers itself healthy.
    pub ok: bool,
    /// Number of asynchronous jobs it is tracking.
    pub async_jobs: Option<u32>,
}

/// Health as reported through the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Base URL that answered.
    pub endpoint: String,
    /// Whether the bridge considers itself healthy.
    pub ok: bool,
    /// Number of asynchronous jobs it is tracking.
    pub async_jobs: Option<u32>,
}

/// Body of `POST <base>/window`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenWindowRequest {
    /// Workspace to open.
    pub worktree_path: String,
    /// Window title.
    pub title: String,
    /// Command to run once the window is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_command: Option<String>,
    /// Close the window when the startup command exits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_after_startup: Option<bool>,
}
