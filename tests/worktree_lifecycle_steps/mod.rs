//! Step definitions for worktree slot lifecycle scenarios.

pub mod world;

mod given;
mod then;
mod when;
