//! Unit tests for the worktree slot context.

mod slot_pool_tests;
