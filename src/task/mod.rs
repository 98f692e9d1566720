//! Task lifecycle management.
//!
//! A task moves from a classified draft to a tracker issue, into a worktree
//! slot where the agent implements it, and on through push, pull request
//! and merge. Failures return the task to the nearest safe status and
//! conflicts come back with an explicit recovery action. The module follows
//! hexagonal architecture:
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
