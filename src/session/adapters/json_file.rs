//! JSON file session store backed by a capability directory handle.

use crate::session::domain::{SESSION_FORMAT_VERSION, SessionState};
use crate::session::ports::{SessionStore, SessionStoreError, SessionStoreResult};
use async_trait::async_trait;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tracing::debug;

/// File name used inside the session directory.
pub const SESSION_FILE_NAME: &str = "session.json";
const TEMP_FILE_NAME: &str = "session.json.tmp";

/// Session store writing one JSON document per directory.
///
/// Saves go to a temporary sibling first and are renamed over the live file,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileSessionStore {
    dir: Arc<Dir>,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

impl JsonFileSessionStore {
    /// Opens the store in `directory`, creating the directory when missing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Persistence`] when the directory cannot
    /// be created or opened.
    pub fn open(directory: &Utf8Path) -> SessionStoreResult<Self> {
        Dir::create_ambient_dir_all(directory, ambient_authority())
            .map_err(SessionStoreError::persistence)?;
        let dir = Dir::open_ambient_dir(directory, ambient_authority())
            .map_err(SessionStoreError::persistence)?;
        Ok(Self { dir: Arc::new(dir) })
    }

    async fn run_blocking<F, T>(&self, f: F) -> SessionStoreResult<T>
    where
        F: FnOnce(&Dir) -> SessionStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || f(&dir))
            .await
            .map_err(|err| SessionStoreError::persistence(io::Error::other(err.to_string())))?
    }
}

fn decode(contents: &str) -> SessionStoreResult<SessionState> {
    let header: VersionHeader = serde_json::from_str(contents)
        .map_err(|err| SessionStoreError::Corrupt(err.to_string()))?;
    if header.version != SESSION_FORMAT_VERSION {
        return Err(SessionStoreError::UnsupportedVersion {
            found: header.version,
            expected: SESSION_FORMAT_VERSION,
        });
    }
    serde_json::from_str(contents).map_err(|err| SessionStoreError::Corrupt(err.to_string()))
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn load_state(&self) -> SessionStoreResult<Option<SessionState>> {
        self.run_blocking(|dir| match dir.read_to_string(SESSION_FILE_NAME) {
            Ok(contents) => decode(&contents).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SessionStoreError::persistence(err)),
        })
        .await
    }

    async fn save_state(&self, state: &SessionState) -> SessionStoreResult<()> {
        let payload = serde_json::to_vec_pretty(state).map_err(SessionStoreError::persistence)?;
        let task_count = state.tasks.len();
        self.run_blocking(move |dir| {
            dir.write(TEMP_FILE_NAME, &payload)
                .and_then(|()| dir.rename(TEMP_FILE_NAME, dir, SESSION_FILE_NAME))
                .map_err(SessionStoreError::persistence)
        })
        .await?;
        debug!(task_count, "session snapshot written");
        Ok(())
    }

    async fn clear_state(&self) -> SessionStoreResult<()> {
        self.run_blocking(|dir| match dir.remove_file(SESSION_FILE_NAME) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SessionStoreError::persistence(err)),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::domain::{Task, TaskDraft};
    use crate::worktree::domain::{SlotId, SlotPool};
    use camino::Utf8PathBuf;
    use eyre::{bail, ensure};
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};

    struct TempSessionDir {
        path: Utf8PathBuf,
    }

    impl Drop for TempSessionDir {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.path).ok();
        }
    }

    #[fixture]
    fn temp_dir() -> TempSessionDir {
        let base = Utf8PathBuf::from_path_buf(std::env::temp_dir()).expect("utf-8 temp dir");
        TempSessionDir {
            path: base.join(format!("gropius-session-{}", uuid::Uuid::new_v4())),
        }
    }

    fn sample_state() -> SessionState {
        let task = Task::new(TaskDraft::new("Fix login", "Users bounce back"), &DefaultClock)
            .expect("valid draft");
        let mut pool = SlotPool::new(3, "/repo").expect("valid layout");
        pool.assign(task.id(), SlotId::new(1).expect("slot id"))
            .expect("assigned");
        SessionState::capture(vec![task], &pool, &DefaultClock)
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn missing_file_loads_as_empty(temp_dir: TempSessionDir) -> eyre::Result<()> {
        let store = JsonFileSessionStore::open(&temp_dir.path)?;

        ensure!(store.load_state().await?.is_none(), "phantom session");
        store.clear_state().await?;
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn saved_state_survives_reopening(temp_dir: TempSessionDir) -> eyre::Result<()> {
        let state = sample_state();
        JsonFileSessionStore::open(&temp_dir.path)?
            .save_state(&state)
            .await?;

        let reopened = JsonFileSessionStore::open(&temp_dir.path)?;

        ensure!(reopened.load_state().await? == Some(state), "snapshot changed on disk");
        ensure!(
            !temp_dir.path.join(TEMP_FILE_NAME).exists(),
            "temporary file left behind"
        );
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn clear_removes_the_snapshot(temp_dir: TempSessionDir) -> eyre::Result<()> {
        let store = JsonFileSessionStore::open(&temp_dir.path)?;
        store.save_state(&sample_state()).await?;

        store.clear_state().await?;

        ensure!(store.load_state().await?.is_none(), "snapshot not removed");
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn garbage_is_reported_as_corrupt(temp_dir: TempSessionDir) -> eyre::Result<()> {
        let store = JsonFileSessionStore::open(&temp_dir.path)?;
        std::fs::write(temp_dir.path.join(SESSION_FILE_NAME), "{ not json")?;

        match store.load_state().await {
            Err(SessionStoreError::Corrupt(_)) => Ok(()),
            other => bail!("expected corrupt snapshot, got {other:?}"),
        }
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn future_versions_are_refused(temp_dir: TempSessionDir) -> eyre::Result<()> {
        let store = JsonFileSessionStore::open(&temp_dir.path)?;
        std::fs::write(
            temp_dir.path.join(SESSION_FILE_NAME),
            r#"{ "version": 9, "tasks": [] }"#,
        )?;

        match store.load_state().await {
            Err(SessionStoreError::UnsupportedVersion { found: 9, .. }) => Ok(()),
            other => bail!("expected version refusal, got {other:?}"),
        }
    }
}
