//! In-memory session store for tests and ephemeral runs.

use crate::session::domain::SessionState;
use crate::session::ports::{SessionStore, SessionStoreError, SessionStoreResult};
use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory session store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    state: Arc<RwLock<Option<SessionState>>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `state`.
    #[must_use]
    pub fn with_state(state: SessionState) -> Self {
        Self {
            state: Arc::new(RwLock::new(Some(state))),
        }
    }

    fn read(&self) -> SessionStoreResult<RwLockReadGuard<'_, Option<SessionState>>> {
        self.state.read().map_err(|err| {
            SessionStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> SessionStoreResult<RwLockWriteGuard<'_, Option<SessionState>>> {
        self.state.write().map_err(|err| {
            SessionStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_state(&self) -> SessionStoreResult<Option<SessionState>> {
        Ok(self.read()?.clone())
    }

    async fn save_state(&self, state: &SessionState) -> SessionStoreResult<()> {
        *self.write()? = Some(state.clone());
        Ok(())
    }

    async fn clear_state(&self) -> SessionStoreResult<()> {
        self.write()?.take();
        Ok(())
    }
}
