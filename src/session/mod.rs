//! Explicit persisted session state.
//!
//! A session is everything the orchestrator needs to resume after a
//! restart: the task records and the slot pool layout with its bindings.
//! Services never reach into ambient storage; they load and save through
//! the [`ports::SessionStore`] port.
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
