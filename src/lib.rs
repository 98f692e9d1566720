//! Gropius: worktree-slot delivery orchestration.
//!
//! This crate coordinates the delivery workflow for a single repository:
//! raw task descriptions become tracker issues, each issue is bound to one of
//! a small fixed pool of local git worktree slots, a code-generation agent is
//! driven inside that slot through a local automation bridge, and the result
//! is pushed, opened as a pull request and merged.
//!
//! # Architecture
//!
//! Gropius follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (HTTP, files, memory)
//!
//! # Modules
//!
//! - [`task`]: Task lifecycle state machine, delivery flows and reconciliation
//! - [`worktree`]: Fixed-size worktree slot allocator and workspace commands
//! - [`bridge`]: Automation bridge transport, command dispatch and job polling
//! - [`session`]: Explicit persisted session state
//! - [`config`]: Layered configuration loading
//! - [`telemetry`]: Tracing subscriber initialisation

pub mod bridge;
pub mod config;
pub mod error;
pub mod session;
pub mod shell;
pub mod task;
pub mod telemetry;
pub mod worktree;
