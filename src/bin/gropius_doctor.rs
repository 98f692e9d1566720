//! Checks that the orchestrator can reach its automation bridge.
//!
//! Usage:
//!
//! ```text
//! gropius-doctor [config-path]
//! ```
//!
//! Without a path the layered project configuration is loaded. The tool
//! logs the resolved configuration, every candidate bridge endpoint in the
//! order they are tried, the worktree slot layout and the bridge health
//! report. It exits non-zero when configuration is invalid or no candidate
//! answers.

use gropius::bridge::adapters::ReqwestBridgeTransport;
use gropius::bridge::adapters::http::DEFAULT_CONTROL_TIMEOUT;
use gropius::bridge::domain::BridgeError;
use gropius::bridge::ports::TransportError;
use gropius::bridge::services::CommandDispatcher;
use gropius::config::{ConfigError, ConfigLoader, GropiusConfig};
use gropius::telemetry::{TelemetryError, init_tracing};
use gropius::worktree::domain::{SlotError, SlotPool};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Builder;
use tracing::{error, info};

#[derive(Debug, Error)]
enum DoctorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

fn load_config() -> Result<GropiusConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

fn report_layout(config: &GropiusConfig) -> Result<(), SlotError> {
    let pool = SlotPool::new(config.worktrees.max_slots, &config.repository.root_path)?;
    for slot in pool.slots() {
        info!(slot_id = %slot.id(), path = slot.path(), "worktree slot");
    }
    Ok(())
}

async fn check_bridge(config: &GropiusConfig) -> Result<(), DoctorError> {
    let transport = Arc::new(ReqwestBridgeTransport::new(DEFAULT_CONTROL_TIMEOUT)?);
    let dispatcher = CommandDispatcher::new(
        transport,
        &config.bridge.resolver(),
        config.bridge.dispatcher_settings(),
    )?;
    for (position, candidate) in dispatcher.candidates().iter().enumerate() {
        info!(
            position,
            endpoint = %candidate.command_url,
            base = %candidate.base_url,
            "bridge candidate"
        );
    }

    let health = dispatcher.health().await?;
    info!(
        endpoint = %health.endpoint,
        ok = health.ok,
        async_jobs = ?health.async_jobs,
        "bridge health"
    );
    Ok(())
}

fn run() -> Result<(), DoctorError> {
    let config = load_config()?;
    init_tracing(&config.logging)?;
    info!(
        owner = %config.repository.owner,
        repository = %config.repository.name,
        default_branch = %config.repository.default_branch,
        root_path = %config.repository.root_path,
        "configuration loaded"
    );
    report_layout(&config)?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(DoctorError::Runtime)?;
    runtime.block_on(check_bridge(&config))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    run().map_err(|err| {
        error!(error = %err, "doctor check failed");
        err.into()
    })
}
