//! Command dispatch with sequential candidate fallback.

use crate::bridge::domain::{
    BridgeEndpoint, BridgeError, CommandContext, CommandFailure, CommandOutput, CommandRequest,
    CommandResponse, EndpointResolver, HealthReport, HealthResponse, JobHandle, JobId,
    JobSnapshot, OpenWindowRequest, PendingJob, TimeoutClass, base_urls,
};
use crate::bridge::ports::{BridgeTransport, TransportError, TransportResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Network timeouts applied to command calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Timeout for single commands.
    pub command_timeout: Duration,
    /// Timeout for workspace setup commands.
    pub setup_timeout: Duration,
}

impl DispatcherSettings {
    const fn timeout_for(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Command => self.command_timeout,
            TimeoutClass::Setup => self.setup_timeout,
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(20),
            setup_timeout: Duration::from_secs(60),
        }
    }
}

/// Executes commands against the bridge.
///
/// Candidates are tried strictly in order. Only an unreachable address or a
/// missing route moves on to the next candidate. A rejection, a request that
/// was delivered but never answered, or a failed command is surfaced from the
/// candidate that produced it.
#[derive(Debug)]
pub struct CommandDispatcher<T>
where
    T: BridgeTransport,
{
    transport: Arc<T>,
    candidates: Vec<BridgeEndpoint>,
    settings: DispatcherSettings,
}

impl<T> CommandDispatcher<T>
where
    T: BridgeTransport,
{
    /// Creates a dispatcher over the candidates `resolver` produces.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidEndpoint`] when the endpoint cannot be
    /// resolved.
    pub fn new(
        transport: Arc<T>,
        resolver: &EndpointResolver,
        settings: DispatcherSettings,
    ) -> Result<Self, BridgeError> {
        let candidates = resolver.resolve()?;
        debug!(
            endpoint = resolver.configured(),
            candidates = candidates.len(),
            "bridge candidates resolved"
        );
        Ok(Self {
            transport,
            candidates,
            settings,
        })
    }

    /// Returns the ordered candidates.
    #[must_use]
    pub fn candidates(&self) -> &[BridgeEndpoint] {
        &self.candidates
    }

    /// Runs `command` and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unreachable`] when no candidate answered,
    /// [`BridgeError::Rejected`] on a protocol-level refusal,
    /// [`BridgeError::NoResponse`] when a candidate took the request but
    /// never answered and [`BridgeError::CommandFailed`] when the command
    /// ran and failed.
    pub async fn run_sync(
        &self,
        command: &str,
        context: CommandContext,
    ) -> Result<CommandOutput, BridgeError> {
        let (endpoint, response) = self.submit(command, context, false).await?;
        if !response.is_success() {
            return Err(command_failed(&endpoint, command, response));
        }
        Ok(output(&endpoint, response))
    }

    /// Submits `command` as an asynchronous job.
    ///
    /// A response without a job id means the bridge ran the command
    /// synchronously; it is returned as [`JobHandle::Completed`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::run_sync`].
    pub async fn run_async(
        &self,
        command: &str,
        context: CommandContext,
    ) -> Result<JobHandle, BridgeError> {
        let (endpoint, mut response) = self.submit(command, context, true).await?;
        if !response.is_success() {
            return Err(command_failed(&endpoint, command, response));
        }
        match response.job_id.take() {
            Some(job_id) => {
                info!(endpoint = %endpoint.command_url, job_id = %job_id, "bridge job submitted");
                Ok(JobHandle::Pending(PendingJob {
                    job_id,
                    endpoint,
                    command: command.to_owned(),
                }))
            }
            None => {
                debug!(endpoint = %endpoint.command_url, "bridge completed async request synchronously");
                Ok(JobHandle::Completed(output(&endpoint, response)))
            }
        }
    }

    /// Fetches the latest snapshot of `job`, asking the accepting candidate
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unreachable`] or [`BridgeError::Rejected`].
    pub async fn job_snapshot(&self, job: &PendingJob) -> Result<JobSnapshot, BridgeError> {
        let call = LogsCall {
            job_id: &job.job_id,
        };
        let (_, snapshot) = self.on_bases(self.bases_preferring(&job.endpoint), &call).await?;
        Ok(snapshot)
    }

    /// Requests cancellation of a job on the first base that answers.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unreachable`] or [`BridgeError::Rejected`].
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), BridgeError> {
        let (base, ()) = self
            .on_bases(base_urls(&self.candidates), &CancelCall { job_id })
            .await?;
        info!(endpoint = %base, job_id = %job_id, "bridge job cancelled");
        Ok(())
    }

    /// Cancels a job, logging instead of returning failures.
    pub async fn cancel_best_effort(&self, job_id: &JobId) {
        if let Err(err) = self.cancel(job_id).await {
            warn!(job_id = %job_id, error = %err, "best-effort job cancellation failed");
        }
    }

    /// Reports bridge health from the first base that answers.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unreachable`] or [`BridgeError::Rejected`].
    pub async fn health(&self) -> Result<HealthReport, BridgeError> {
        let (endpoint, health) = self
            .on_bases(base_urls(&self.candidates), &HealthCall)
            .await?;
        Ok(HealthReport {
            endpoint,
            ok: health.ok,
            async_jobs: health.async_jobs,
        })
    }

    /// Asks the bridge to open a terminal window.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unreachable`] or [`BridgeError::Rejected`].
    pub async fn open_window(&self, request: &OpenWindowRequest) -> Result<(), BridgeError> {
        self.on_bases(base_urls(&self.candidates), &WindowCall { request })
            .await
            .map(|_| ())
    }

    async fn submit(
        &self,
        command: &str,
        context: CommandContext,
        run_async: bool,
    ) -> Result<(BridgeEndpoint, CommandResponse), BridgeError> {
        let timeout = self.settings.timeout_for(context.timeout);
        let request = CommandRequest::new(command, context, run_async);
        let mut attempted = Vec::with_capacity(self.candidates.len());
        let mut last_error = String::from("no candidate endpoints");

        for (attempt, endpoint) in self.candidates.iter().enumerate() {
            attempted.push(endpoint.command_url.clone());
            match self.transport.execute(endpoint, &request, timeout).await {
                Ok(response) => return Ok((endpoint.clone(), response)),
                Err(err) if err.allows_fallback() => {
                    warn!(
                        endpoint = %endpoint.command_url,
                        attempt,
                        error = %err,
                        "bridge candidate failed, trying next"
                    );
                    last_error = err.to_string();
                }
                Err(err) => return Err(surfaced(&endpoint.command_url, command, err)),
            }
        }

        Err(BridgeError::Unreachable {
            command: command.to_owned(),
            attempted,
            last_error,
        })
    }

    fn bases_preferring(&self, preferred: &BridgeEndpoint) -> Vec<String> {
        let mut bases = vec![preferred.base_url.clone()];
        for base in base_urls(&self.candidates) {
            if !bases.contains(&base) {
                bases.push(base);
            }
        }
        bases
    }

    async fn on_bases<C>(
        &self,
        bases: Vec<String>,
        call: &C,
    ) -> Result<(String, C::Output), BridgeError>
    where
        C: BaseCall<T>,
    {
        let mut attempted = Vec::with_capacity(bases.len());
        let mut last_error = String::from("no candidate endpoints");

        for base in bases {
            attempted.push(base.clone());
            match call.send(&self.transport, &base).await {
                Ok(reply) => return Ok((base, reply)),
                Err(err) if err.allows_fallback() => {
                    debug!(endpoint = %base, route = call.label(), error = %err, "bridge base failed, trying next");
                    last_error = err.to_string();
                }
                Err(err) => return Err(surfaced(&base, &call.label(), err)),
            }
        }

        Err(BridgeError::Unreachable {
            command: call.label(),
            attempted,
            last_error,
        })
    }
}

/// A call against a base URL rather than the command route.
#[async_trait]
trait BaseCall<T: BridgeTransport>: Sync {
    type Output: Send;

    async fn send(&self, transport: &T, base_url: &str) -> TransportResult<Self::Output>;

    fn label(&self) -> String;
}

struct LogsCall<'a> {
    job_id: &'a JobId,
}

#[async_trait]
impl<T: BridgeTransport> BaseCall<T> for LogsCall<'_> {
    type Output = JobSnapshot;

    async fn send(&self, transport: &T, base_url: &str) -> TransportResult<JobSnapshot> {
        transport.job_logs(base_url, self.job_id).await
    }

    fn label(&self) -> String {
        format!("logs for job {}", self.job_id)
    }
}

struct CancelCall<'a> {
    job_id: &'a JobId,
}

#[async_trait]
impl<T: BridgeTransport> BaseCall<T> for CancelCall<'_> {
    type Output = ();

    async fn send(&self, transport: &T, base_url: &str) -> TransportResult<()> {
        transport.cancel_job(base_url, self.job_id).await
    }

    fn label(&self) -> String {
        format!("cancel job {}", self.job_id)
    }
}

struct HealthCall;

#[async_trait]
impl<T: BridgeTransport> BaseCall<T> for HealthCall {
    type Output = HealthResponse;

    async fn send(&self, transport: &T, base_url: &str) -> TransportResult<HealthResponse> {
        transport.health(base_url).await
    }

    fn label(&self) -> String {
        "health".to_owned()
    }
}

struct WindowCall<'a> {
    request: &'a OpenWindowRequest,
}

#[async_trait]
impl<T: BridgeTransport> BaseCall<T> for WindowCall<'_> {
    type Output = ();

    async fn send(&self, transport: &T, base_url: &str) -> TransportResult<()> {
        transport.open_window(base_url, self.request).await
    }

    fn label(&self) -> String {
        format!("open window at {}", self.request.worktree_path)
    }
}

fn surfaced(endpoint: &str, command: &str, err: TransportError) -> BridgeError {
    match err {
        TransportError::NoResponse(reason) => {
            warn!(endpoint, command, "bridge accepted the request but did not answer");
            BridgeError::NoResponse {
                endpoint: endpoint.to_owned(),
                command: command.to_owned(),
                reason,
            }
        }
        other => BridgeError::Rejected {
            endpoint: endpoint.to_owned(),
            command: command.to_owned(),
            reason: other.to_string(),
        },
    }
}

fn command_failed(endpoint: &BridgeEndpoint, command: &str, response: CommandResponse) -> BridgeError {
    warn!(
        endpoint = %endpoint.command_url,
        exit_code = ?response.exit_code,
        "bridge command failed"
    );
    CommandFailure {
        endpoint: endpoint.command_url.clone(),
        command: command.to_owned(),
        job_id: response.job_id,
        exit_code: response.exit_code,
        stdout: response.stdout,
        stderr: response.stderr,
        message: response.error,
    }
    .into()
}

fn output(endpoint: &BridgeEndpoint, response: CommandResponse) -> CommandOutput {
    CommandOutput {
        endpoint: endpoint.command_url.clone(),
        exit_code: response.exit_code,
        stdout: response.stdout,
        stderr: response.stderr,
    }
}
