//! Asynchronous job records.

use super::{BridgeEndpoint, JobSnapshot};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Job identifier issued by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wraps a bridge job id.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the id as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output of a command that completed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command URL that ran the command.
    pub endpoint: String,
    /// Exit code, when reported.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// A submitted job the bridge is still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJob {
    /// Job id.
    pub job_id: JobId,
    /// Candidate that accepted the job.
    pub endpoint: BridgeEndpoint,
    /// Submitted command line.
    pub command: String,
}

/// Result of an asynchronous submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobHandle {
    /// The bridge returned a job id.
    Pending(PendingJob),
    /// The bridge ran the command synchronously anyway.
    Completed(CommandOutput),
}

/// Locally tracked state of an asynchronous job.
///
/// Once `done` has been observed the record is frozen: later snapshots can
/// no longer change the exit code, success flag or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeJob {
    id: JobId,
    command: String,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    stdout: String,
    stderr: String,
    done: bool,
    exit_code: Option<i32>,
    success: Option<bool>,
}

impl BridgeJob {
    /// Starts tracking a job submitted at `submitted_at`.
    #[must_use]
    pub fn new(id: JobId, command: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            command: command.into(),
            pid: None,
            started_at: submitted_at,
            updated_at: None,
            stdout: String::new(),
            stderr: String::new(),
            done: false,
            exit_code: None,
            success: None,
        }
    }

    /// Folds a poll snapshot into the record.
    pub fn apply(&mut self, snapshot: &JobSnapshot) {
        if self.done {
            return;
        }
        if let Some(started) = snapshot.started_at.and_then(DateTime::<Utc>::from_timestamp_millis) {
            self.started_at = started;
        }
        if let Some(updated) = snapshot.updated_at.and_then(DateTime::<Utc>::from_timestamp_millis) {
            self.updated_at = Some(updated);
        }
        self.pid = snapshot.pid.or(self.pid);
        self.stdout.clone_from(&snapshot.stdout);
        self.stderr.clone_from(&snapshot.stderr);
        self.done = snapshot.done;
        self.exit_code = snapshot.exit_code;
        self.success = snapshot.success;
    }

    /// Returns how long the job has been silent at `now`.
    ///
    /// Silence is measured from the last update, or from the start when the
    /// bridge has not reported one.
    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let last_activity = self.updated_at.unwrap_or(self.started_at);
        now.signed_duration_since(last_activity)
            .max(TimeDelta::zero())
            .to_std()
            .unwrap_or_default()
    }

    /// Returns `true` once any output has been captured.
    #[must_use]
    pub fn produced_output(&self) -> bool {
        !self.stdout.trim().is_empty() || !self.stderr.trim().is_empty()
    }

    /// Returns `true` when the job finished without a failure flag or a
    /// non-zero exit code.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.done
            && self.success != Some(false)
            && self.exit_code.is_none_or(|code| code == 0)
    }

    /// Returns the job id.
    #[must_use]
    pub const fn id(&self) -> &JobId {
        &self.id
    }

    /// Returns the submitted command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the process id, once reported.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns the start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the cumulative standard output.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Returns the cumulative standard error.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Returns `true` once the bridge reported completion.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Returns the exit code, once reported.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}
