//! Unit tests for the task context.

mod support;
