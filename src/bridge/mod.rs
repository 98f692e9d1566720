//! Local automation bridge client.
//!
//! The bridge is a small HTTP service on the developer machine that runs
//! shell commands and reports asynchronous job progress. This module owns the
//! endpoint resolution strategy, the wire protocol, the transport port with
//! its HTTP and scripted adapters, and the dispatcher and job poller services
//! built on top of it.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
