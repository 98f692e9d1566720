//! Cross-context error classification.
//!
//! Each bounded context keeps its own `thiserror` enums. [`ErrorKind`] folds
//! them into the operational taxonomy callers use to pick between retrying,
//! surfacing a failure and offering a recovery action.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sub-kind of an issue-tracker or drafting API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalApiKind {
    /// The API throttled the caller.
    RateLimited,
    /// The credentials lack the required permission.
    PermissionDenied,
    /// The addressed resource does not exist.
    NotFound,
    /// The API rejected the request payload.
    Validation,
    /// The pull request cannot be merged in its current state.
    MergeNotAllowed,
    /// The API could not be reached or answered garbage.
    Transport,
}

/// Operational error taxonomy shared by every service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ErrorKind {
    /// The bridge was unreachable on every candidate endpoint.
    Connectivity,
    /// A bridge answered but rejected the request at protocol level.
    Protocol,
    /// A command ran and failed.
    CommandFailure,
    /// A logical conflict (slot bound, branch checked out, diverged remote).
    Conflict,
    /// An asynchronous job went stale or exhausted its poll budget.
    Timeout,
    /// The issue tracker or drafting API rejected a request.
    ExternalApi(ExternalApiKind),
    /// Input or lifecycle validation failed.
    Validation,
    /// Local state could not be read or written.
    Persistence,
}

impl ErrorKind {
    /// Returns `true` when retrying the same high-level operation later may
    /// succeed without user intervention.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Connectivity
                | Self::Timeout
                | Self::ExternalApi(ExternalApiKind::RateLimited | ExternalApiKind::Transport)
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => f.write_str("connectivity"),
            Self::Protocol => f.write_str("protocol"),
            Self::CommandFailure => f.write_str("command_failure"),
            Self::Conflict => f.write_str("conflict"),
            Self::Timeout => f.write_str("timeout"),
            Self::ExternalApi(kind) => write!(f, "external_api:{kind:?}"),
            Self::Validation => f.write_str("validation"),
            Self::Persistence => f.write_str("persistence"),
        }
    }
}
