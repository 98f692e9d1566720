//! Bridge error taxonomy.

use super::JobId;
use crate::error::ErrorKind;
use std::fmt;
use thiserror::Error;

/// Maximum number of characters of command output quoted in error text.
const EXCERPT_CHARS: usize = 600;

/// Errors surfaced by the dispatcher and the job poller.
///
/// Every variant carries the command and the endpoints involved so a
/// misconfigured local environment can be diagnosed from the message alone.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The configured endpoint cannot be parsed.
    #[error("invalid bridge endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// Configured endpoint text.
        endpoint: String,
        /// Parse failure.
        reason: String,
    },

    /// No candidate endpoint responded.
    #[error("bridge unreachable for `{command}` (tried {}): {last_error}", .attempted.join(", "))]
    Unreachable {
        /// Command or route being called.
        command: String,
        /// Every URL attempted, in order.
        attempted: Vec<String>,
        /// Error from the last attempt.
        last_error: String,
    },

    /// A candidate answered but rejected the request at protocol level.
    #[error("bridge at {endpoint} rejected `{command}`: {reason}")]
    Rejected {
        /// URL that rejected the request.
        endpoint: String,
        /// Command or route being called.
        command: String,
        /// Rejection reason.
        reason: String,
    },

    /// A candidate accepted the request but never answered it.
    #[error("bridge at {endpoint} accepted `{command}` but did not answer: {reason}")]
    NoResponse {
        /// URL the request was delivered to.
        endpoint: String,
        /// Command or route being called.
        command: String,
        /// Transport error text.
        reason: String,
    },

    /// The command ran and failed.
    #[error(transparent)]
    CommandFailed(Box<CommandFailure>),

    /// An asynchronous job stopped producing output before finishing.
    #[error(
        "job {job_id} for `{command}` {} and was cancelled after {idle_secs}s of silence",
        silence_description(.produced_output)
    )]
    StaleJob {
        /// Job id.
        job_id: JobId,
        /// Submitted command.
        command: String,
        /// Seconds since the last update.
        idle_secs: u64,
        /// Whether any output was seen before the silence.
        produced_output: bool,
    },

    /// The poll budget ran out before the job finished.
    #[error("job {job_id} for `{command}` did not finish within {attempts} polls and was cancelled")]
    PollAttemptsExhausted {
        /// Job id.
        job_id: JobId,
        /// Submitted command.
        command: String,
        /// Number of polls performed.
        attempts: u32,
    },

    /// The agent command template could not be compiled or rendered.
    #[error("command template error: {0}")]
    Template(String),
}

impl BridgeError {
    /// Classifies the error for callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEndpoint { .. } | Self::Template(_) => ErrorKind::Validation,
            Self::Unreachable { .. } => ErrorKind::Connectivity,
            Self::Rejected { .. } => ErrorKind::Protocol,
            Self::CommandFailed(_) => ErrorKind::CommandFailure,
            Self::NoResponse { .. }
            | Self::StaleJob { .. }
            | Self::PollAttemptsExhausted { .. } => ErrorKind::Timeout,
        }
    }

    /// Returns the failure details of a failed command.
    #[must_use]
    pub fn command_failure(&self) -> Option<&CommandFailure> {
        match self {
            Self::CommandFailed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns every piece of text that describes the failure, for callers
    /// that classify failures by message.
    #[must_use]
    pub fn diagnostic_text(&self) -> String {
        self.command_failure()
            .map_or_else(|| self.to_string(), CommandFailure::diagnostic_text)
    }
}

impl From<CommandFailure> for BridgeError {
    fn from(value: CommandFailure) -> Self {
        Self::CommandFailed(Box::new(value))
    }
}

/// Details of a command that ran and failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// URL that ran the command.
    pub endpoint: String,
    /// Command line.
    pub command: String,
    /// Job id for asynchronous runs.
    pub job_id: Option<JobId>,
    /// Exit code, when reported.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Bridge error message.
    pub message: Option<String>,
}

impl CommandFailure {
    /// Joins the bridge message, standard error and standard output.
    #[must_use]
    pub fn diagnostic_text(&self) -> String {
        [
            self.message.as_deref().unwrap_or_default(),
            self.stderr.as_str(),
            self.stdout.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` failed on {}", self.command, self.endpoint)?;
        if let Some(code) = self.exit_code {
            write!(f, " with exit code {code}")?;
        }
        if let Some(job_id) = &self.job_id {
            write!(f, " (job {job_id})")?;
        }
        let detail = self.diagnostic_text();
        if !detail.is_empty() {
            write!(f, ": {}", excerpt(&detail))?;
        }
        Ok(())
    }
}

impl std::error::Error for CommandFailure {}

const fn silence_description(produced_output: &bool) -> &'static str {
    if *produced_output {
        "went silent"
    } else {
        "never produced output"
    }
}

/// Keeps the last `EXCERPT_CHARS` characters, where errors usually are.
fn excerpt(text: &str) -> String {
    let total = text.chars().count();
    if total <= EXCERPT_CHARS {
        return text.to_owned();
    }
    let tail: String = text.chars().skip(total - EXCERPT_CHARS).collect();
    format!("...{tail}")
}
