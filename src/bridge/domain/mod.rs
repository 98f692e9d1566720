//! Bridge domain types.

mod endpoint;
mod error;
mod job;
mod template;
mod wire;

pub use endpoint::{BridgeEndpoint, EndpointResolver, base_urls, join_route};
pub use error::{BridgeError, CommandFailure};
pub use job::{BridgeJob, CommandOutput, JobHandle, JobId, PendingJob};
pub use template::{CommandTemplate, PLACEHOLDERS};
pub use wire::{
    CancelRequest, CommandContext, CommandMode, CommandRequest, CommandResponse, HealthReport,
    HealthResponse, JobSnapshot, OpenWindowRequest, TimeoutClass,
};
