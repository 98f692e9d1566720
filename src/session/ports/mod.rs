//! Port contracts for session persistence.

mod store;

pub use store::{SessionStore, SessionStoreError, SessionStoreResult};
