//! Unit tests for the bridge context.

mod job_tests;
mod support;
