//! Errors raised by the session service.

use crate::error::ErrorKind;
use crate::session::ports::SessionStoreError;
use crate::task::ports::TaskRepositoryError;
use crate::worktree::domain::SlotError;
use thiserror::Error;

/// Service-level errors for session operations.
#[derive(Debug, Error)]
pub enum SessionServiceError {
    /// The session store failed.
    #[error(transparent)]
    Store(#[from] SessionStoreError),
    /// The task repository failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// The slot pool rejected the stored layout.
    #[error(transparent)]
    Slot(#[from] SlotError),
}

impl SessionServiceError {
    /// Classifies the error for callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(SessionStoreError::Corrupt(_) | SessionStoreError::UnsupportedVersion { .. }) => {
                ErrorKind::Validation
            }
            Self::Store(SessionStoreError::Persistence(_)) | Self::Repository(_) => {
                ErrorKind::Persistence
            }
            Self::Slot(err) => err.kind(),
        }
    }
}

/// Result type for session service operations.
pub type SessionServiceResult<T> = Result<T, SessionServiceError>;
