//! Fixed-size worktree slot pool.
//!
//! A slot is a stable local workspace directory, a sibling of the repository
//! root, that can be bound to at most one task at a time. The module follows
//! the same layering as the task context:
//!
//! - Domain types in [`domain`]
//! - Orchestration services in [`services`]

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
