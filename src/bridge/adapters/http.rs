//! HTTP transport built on `reqwest`.

use crate::bridge::domain::{
    BridgeEndpoint, CancelRequest, CommandRequest, CommandResponse, HealthResponse, JobId,
    JobSnapshot, OpenWindowRequest, join_route,
};
use crate::bridge::ports::{BridgeTransport, TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const LOGS_ROUTE: &str = "logs";
const CANCEL_ROUTE: &str = "cancel";
const HEALTH_ROUTE: &str = "health";
const WINDOW_ROUTE: &str = "window";

/// Default timeout for log, cancel, health and window calls.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

/// Bridge transport over HTTP.
#[derive(Debug, Clone)]
pub struct ReqwestBridgeTransport {
    client: Client,
    control_timeout: Duration,
}

impl ReqwestBridgeTransport {
    /// Creates a transport with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unreachable`] if the HTTP client cannot be
    /// built, e.g. when no TLS backend is available.
    pub fn new(control_timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .tcp_nodelay(true)
            .build()
            .map_err(|err| TransportError::Unreachable(err.to_string()))?;
        Ok(Self::with_client(client, control_timeout))
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub const fn with_client(client: Client, control_timeout: Duration) -> Self {
        Self {
            client,
            control_timeout,
        }
    }

    async fn send(request: RequestBuilder) -> TransportResult<Response> {
        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED) {
            return Err(TransportError::RouteNotFound {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn expect_json<T: DeserializeOwned>(request: RequestBuilder) -> TransportResult<T> {
        let response = Self::send(request).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::InvalidResponse(err.to_string()))?;
        if !status.is_success() {
            return Err(rejected(status, &body));
        }
        serde_json::from_str(&body).map_err(|err| TransportError::InvalidResponse(err.to_string()))
    }

    async fn expect_success(request: RequestBuilder) -> TransportResult<()> {
        let response = Self::send(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(rejected(status, &body))
    }
}

/// Only a failed connection proves the request never reached the bridge.
fn classify_send_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() {
        TransportError::Unreachable(err.to_string())
    } else if err.is_decode() || err.is_body() {
        TransportError::InvalidResponse(err.to_string())
    } else if err.is_builder() {
        TransportError::Rejected {
            status: None,
            message: err.to_string(),
        }
    } else {
        TransportError::NoResponse(err.to_string())
    }
}

fn rejected(status: StatusCode, body: &str) -> TransportError {
    TransportError::Rejected {
        status: Some(status.as_u16()),
        message: body.trim().to_owned(),
    }
}

#[async_trait]
impl BridgeTransport for ReqwestBridgeTransport {
    async fn execute(
        &self,
        endpoint: &BridgeEndpoint,
        request: &CommandRequest,
        timeout: Duration,
    ) -> TransportResult<CommandResponse> {
        debug!(endpoint = %endpoint.command_url, run_async = request.run_async, "posting bridge command");
        let response = Self::send(
            self.client
                .post(&endpoint.command_url)
                .timeout(timeout)
                .json(request),
        )
        .await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::InvalidResponse(err.to_string()))?;

        match serde_json::from_str::<CommandResponse>(&body) {
            Ok(parsed) if status.is_success() || parsed.carries_result() => Ok(parsed),
            Ok(_) => Err(rejected(status, &body)),
            Err(_) if !status.is_success() => Err(rejected(status, &body)),
            Err(err) => Err(TransportError::InvalidResponse(err.to_string())),
        }
    }

    async fn job_logs(&self, base_url: &str, job_id: &JobId) -> TransportResult<JobSnapshot> {
        Self::expect_json(
            self.client
                .get(join_route(base_url, LOGS_ROUTE))
                .query(&[("jobId", job_id.as_str())])
                .timeout(self.control_timeout),
        )
        .await
    }

    async fn cancel_job(&self, base_url: &str, job_id: &JobId) -> TransportResult<()> {
        Self::expect_success(
            self.client
                .post(join_route(base_url, CANCEL_ROUTE))
                .timeout(self.control_timeout)
                .json(&CancelRequest {
                    job_id: job_id.clone(),
                }),
        )
        .await
    }

    async fn health(&self, base_url: &str) -> TransportResult<HealthResponse> {
        Self::expect_json(
            self.client
                .get(join_route(base_url, HEALTH_ROUTE))
                .timeout(self.control_timeout),
        )
        .await
    }

    async fn open_window(
        &self,
        base_url: &str,
        request: &OpenWindowRequest,
    ) -> TransportResult<()> {
        Self::expect_success(
            self.client
                .post(join_route(base_url, WINDOW_ROUTE))
                .timeout(self.control_timeout)
                .json(request),
        )
        .await
    }
}
