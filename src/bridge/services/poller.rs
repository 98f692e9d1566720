//! Polling of asynchronous bridge jobs.

use super::CommandDispatcher;
use crate::bridge::domain::{BridgeError, BridgeJob, CommandFailure, PendingJob};
use crate::bridge::ports::BridgeTransport;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Poll cadence and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between polls.
    pub interval: Duration,
    /// Maximum number of polls before giving up.
    pub max_attempts: u32,
    /// Silence after which a running job is considered abandoned.
    pub stale_after: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 2400,
            stale_after: Duration::from_secs(300),
        }
    }
}

/// Polls a submitted job until it finishes, goes stale or exhausts the
/// attempt budget.
#[derive(Debug)]
pub struct JobPoller<T, C>
where
    T: BridgeTransport,
    C: Clock + Send + Sync,
{
    dispatcher: Arc<CommandDispatcher<T>>,
    clock: Arc<C>,
    settings: PollSettings,
}

impl<T, C> JobPoller<T, C>
where
    T: BridgeTransport,
    C: Clock + Send + Sync,
{
    /// Creates a poller.
    #[must_use]
    pub const fn new(
        dispatcher: Arc<CommandDispatcher<T>>,
        clock: Arc<C>,
        settings: PollSettings,
    ) -> Self {
        Self {
            dispatcher,
            clock,
            settings,
        }
    }

    /// Returns the poll settings.
    #[must_use]
    pub const fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Polls `job` until completion.
    ///
    /// Every successful poll is forwarded to `on_progress`, including polls
    /// of a job that is still running. Poll errors are logged and count
    /// against the attempt budget.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::CommandFailed`] when the job finished with a
    /// failure, and [`BridgeError::StaleJob`] or
    /// [`BridgeError::PollAttemptsExhausted`] after a best-effort
    /// cancellation when the job never finished.
    pub async fn wait<F>(&self, job: &PendingJob, mut on_progress: F) -> Result<BridgeJob, BridgeError>
    where
        F: FnMut(&BridgeJob) + Send,
    {
        let mut record = BridgeJob::new(job.job_id.clone(), job.command.clone(), self.clock.utc());

        for attempt in 1..=self.settings.max_attempts {
            match self.dispatcher.job_snapshot(job).await {
                Ok(snapshot) => {
                    record.apply(&snapshot);
                    on_progress(&record);
                }
                Err(err) => {
                    warn!(job_id = %job.job_id, attempt, error = %err, "job poll failed");
                }
            }

            if record.is_done() {
                return finish(job, record);
            }

            let idle = record.idle_for(self.clock.utc());
            if idle > self.settings.stale_after {
                warn!(
                    job_id = %job.job_id,
                    idle_secs = idle.as_secs(),
                    produced_output = record.produced_output(),
                    "job went stale, cancelling"
                );
                self.dispatcher.cancel_best_effort(&job.job_id).await;
                return Err(BridgeError::StaleJob {
                    job_id: job.job_id.clone(),
                    command: job.command.clone(),
                    idle_secs: idle.as_secs(),
                    produced_output: record.produced_output(),
                });
            }

            debug!(job_id = %job.job_id, attempt, "job still running");
            tokio::time::sleep(self.settings.interval).await;
        }

        warn!(job_id = %job.job_id, attempts = self.settings.max_attempts, "job poll budget exhausted, cancelling");
        self.dispatcher.cancel_best_effort(&job.job_id).await;
        Err(BridgeError::PollAttemptsExhausted {
            job_id: job.job_id.clone(),
            command: job.command.clone(),
            attempts: self.settings.max_attempts,
        })
    }
}

fn finish(job: &PendingJob, record: BridgeJob) -> Result<BridgeJob, BridgeError> {
    if record.succeeded() {
        info!(job_id = %job.job_id, exit_code = ?record.exit_code(), "job finished");
        return Ok(record);
    }
    warn!(job_id = %job.job_id, exit_code = ?record.exit_code(), "job finished with failure");
    Err(CommandFailure {
        endpoint: job.endpoint.command_url.clone(),
        command: job.command.clone(),
        job_id: Some(job.job_id.clone()),
        exit_code: record.exit_code(),
        stdout: record.stdout().to_owned(),
        stderr: record.stderr().to_owned(),
        message: None,
    }
    .into())
}
