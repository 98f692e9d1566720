//! Single-call transport to one bridge candidate.

use crate::bridge::domain::{
    BridgeEndpoint, CommandRequest, CommandResponse, HealthResponse, JobId, JobSnapshot,
    OpenWindowRequest,
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Performs one call against one candidate address.
///
/// Implementations never iterate candidates themselves; the dispatcher owns
/// fallback so that side-effecting commands run on at most one candidate.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Posts a command to `endpoint.command_url`.
    async fn execute(
        &self,
        endpoint: &BridgeEndpoint,
        request: &CommandRequest,
        timeout: Duration,
    ) -> TransportResult<CommandResponse>;

    /// Fetches the current snapshot of a job.
    async fn job_logs(&self, base_url: &str, job_id: &JobId) -> TransportResult<JobSnapshot>;

    /// Requests cancellation of a job.
    async fn cancel_job(&self, base_url: &str, job_id: &JobId) -> TransportResult<()>;

    /// Queries bridge health.
    async fn health(&self, base_url: &str) -> TransportResult<HealthResponse>;

    /// Asks the bridge to open a terminal window.
    async fn open_window(&self, base_url: &str, request: &OpenWindowRequest)
    -> TransportResult<()>;
}

/// Errors returned by a single transport call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Nothing answered at the address.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Something answered but the route does not exist there.
    #[error("route not found (HTTP {status})")]
    RouteNotFound {
        /// HTTP status.
        status: u16,
    },

    /// The request reached the address but no reply arrived in time. The
    /// command may be running, so it must not be sent anywhere else.
    #[error("no response: {0}")]
    NoResponse(String),

    /// The bridge refused the request.
    #[error("rejected{}: {message}", .status.map(|code| format!(" (HTTP {code})")).unwrap_or_default())]
    Rejected {
        /// HTTP status, when there was one.
        status: Option<u16>,
        /// Response text.
        message: String,
    },

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Returns `true` when the dispatcher may try the next candidate.
    #[must_use]
    pub const fn allows_fallback(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::RouteNotFound { .. })
    }
}
