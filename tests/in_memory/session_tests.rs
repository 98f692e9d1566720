//! Saving orchestrator state to disk and restoring it into a fresh process.

use super::helpers::{AGENT_COMMAND, Orchestrator, orchestrator};
use camino::Utf8PathBuf;
use eyre::{bail, ensure};
use gropius::bridge::domain::CommandResponse;
use gropius::session::adapters::{JsonFileSessionStore, SESSION_FILE_NAME};
use gropius::session::services::SessionService;
use gropius::task::adapters::memory::InMemoryTaskRepository;
use gropius::task::domain::TaskStatus;
use gropius::task::ports::TaskRepository;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::sync::Arc;

struct SessionDir(Utf8PathBuf);

impl Drop for SessionDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

#[fixture]
fn session_dir() -> SessionDir {
    let base = Utf8PathBuf::from_path_buf(std::env::temp_dir()).expect("utf-8 temp dir");
    SessionDir(base.join(format!("gropius-it-{}", uuid::Uuid::new_v4())))
}

type FileSessions = SessionService<InMemoryTaskRepository, JsonFileSessionStore, DefaultClock>;

fn session_service(o: &Orchestrator, dir: &SessionDir) -> eyre::Result<FileSessions> {
    Ok(SessionService::new(
        Arc::clone(&o.repository),
        Arc::clone(&o.slots),
        Arc::new(JsonFileSessionStore::open(&dir.0)?),
        Arc::new(DefaultClock),
    ))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_resumes_tasks_and_slot_bindings(
    orchestrator: Orchestrator,
    #[from(orchestrator)] restarted: Orchestrator,
    session_dir: SessionDir,
) -> eyre::Result<()> {
    let task = orchestrator.drafted().await;
    orchestrator.open_workspace(&task).await;
    session_service(&orchestrator, &session_dir)?.save().await?;
    ensure!(
        session_dir.0.join(SESSION_FILE_NAME).exists(),
        "session file not written"
    );

    let report = match session_service(&restarted, &session_dir)?.restore().await? {
        Some(report) => report,
        None => bail!("nothing restored"),
    };

    ensure!(report.task_count == 2, "unexpected report {report:?}");
    ensure!(report.restored_bindings == 1, "binding not restored");
    let restored = restarted
        .repository
        .find_by_id(task.id())
        .await?
        .ok_or_else(|| eyre::eyre!("task missing after restart"))?;
    ensure!(restored.status() == TaskStatus::WorktreeActive, "status {}", restored.status());
    let slot = restarted
        .slots
        .slot_for_task(task.id())?
        .ok_or_else(|| eyre::eyre!("slot binding missing after restart"))?;
    ensure!(slot.path() == "/srv/widgets-wt-1", "slot path {}", slot.path());

    restarted
        .transport
        .respond_to(AGENT_COMMAND, CommandResponse::succeeded("done"));
    let implemented = restarted.lifecycle.run_agent(task.id(), |_| {}).await?;
    ensure!(
        implemented.status() == TaskStatus::Implemented,
        "restored task cannot continue: {}",
        implemented.status()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reset_discards_the_saved_session(
    orchestrator: Orchestrator,
    session_dir: SessionDir,
) -> eyre::Result<()> {
    let task = orchestrator.drafted().await;
    orchestrator.open_workspace(&task).await;
    let service = session_service(&orchestrator, &session_dir)?;
    service.save().await?;

    service.reset().await?;

    ensure!(
        !session_dir.0.join(SESSION_FILE_NAME).exists(),
        "session file kept"
    );
    ensure!(orchestrator.intake.list_tasks().await?.is_empty(), "tasks kept");
    ensure!(orchestrator.slots.find_free()?.len() == 2, "bindings kept");
    ensure!(service.restore().await?.is_none(), "cleared session restored");
    Ok(())
}
