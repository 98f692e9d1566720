//! Session store port.

use crate::session::domain::SessionState;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for session store operations.
pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// Persistence contract for the session snapshot.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the stored snapshot, or `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Corrupt`] for unreadable snapshots,
    /// [`SessionStoreError::UnsupportedVersion`] for snapshots written by an
    /// incompatible format, or [`SessionStoreError::Persistence`].
    async fn load_state(&self) -> SessionStoreResult<Option<SessionState>>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Persistence`] when the write fails.
    async fn save_state(&self, state: &SessionState) -> SessionStoreResult<()>;

    /// Deletes the stored snapshot. Clearing an empty store is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Persistence`] when the removal fails.
    async fn clear_state(&self) -> SessionStoreResult<()>;
}

/// Errors returned by session store implementations.
#[derive(Debug, Clone, Error)]
pub enum SessionStoreError {
    /// The stored snapshot could not be decoded.
    #[error("stored session is corrupt: {0}")]
    Corrupt(String),

    /// The snapshot was written by an unsupported format version.
    #[error("unsupported session format version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version found in the snapshot.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// Storage-layer failure.
    #[error("session persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl SessionStoreError {
    /// Wraps a storage error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
