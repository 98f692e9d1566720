//! Session persistence orchestration.

use super::error::SessionServiceResult;
use crate::session::domain::{SessionState, SlotBinding};
use crate::session::ports::SessionStore;
use crate::task::domain::{AgentRunState, Task, TaskId};
use crate::task::ports::TaskRepository;
use crate::worktree::domain::SlotPool;
use crate::worktree::services::WorktreeSlotAllocator;
use mockable::Clock;
use std::sync::Arc;
use tracing::{info, warn};

const INTERRUPTED_RUN_LOG: &str = "agent run interrupted before the session was restored";

/// What a restore re-applied and what it discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Number of tasks loaded.
    pub task_count: usize,
    /// Number of slot bindings re-applied.
    pub restored_bindings: usize,
    /// Bindings discarded because the task or slot no longer exists.
    pub dropped_bindings: Vec<SlotBinding>,
    /// Tasks whose agent run was in flight when the snapshot was taken.
    pub interrupted_runs: Vec<TaskId>,
}

/// Saves, restores and resets the persisted session.
pub struct SessionService<R, S, C>
where
    R: TaskRepository,
    S: SessionStore,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    slots: Arc<WorktreeSlotAllocator>,
    store: Arc<S>,
    clock: Arc<C>,
}

impl<R, S, C> SessionService<R, S, C>
where
    R: TaskRepository,
    S: SessionStore,
    C: Clock + Send + Sync,
{
    /// Creates a session service over the shared repository and pool.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        slots: Arc<WorktreeSlotAllocator>,
        store: Arc<S>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            slots,
            store,
            clock,
        }
    }

    /// Snapshots every task and the pool, then writes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns repository, slot lock or store failures.
    pub async fn save(&self) -> SessionServiceResult<SessionState> {
        let tasks = self.repository.list_all().await?;
        let pool = self.slots.snapshot()?;
        let state = SessionState::capture(tasks, &pool, &*self.clock);
        self.store.save_state(&state).await?;
        info!(
            task_count = state.tasks.len(),
            binding_count = state.slots.bindings.len(),
            "session saved"
        );
        Ok(state)
    }

    /// Loads the stored snapshot and makes it the live state.
    ///
    /// Bindings that reference unknown tasks or slots outside the stored
    /// pool are dropped. Agent runs that were in flight are recorded as
    /// failed, since their bridge jobs did not survive. Returns `None` and
    /// leaves the live state untouched when nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns store failures, a slot error for an invalid stored layout or
    /// repository failures. The live state is unchanged when the snapshot
    /// cannot be read or its layout is invalid.
    pub async fn restore(&self) -> SessionServiceResult<Option<RestoreReport>> {
        let Some(state) = self.store.load_state().await? else {
            info!("no stored session to restore");
            return Ok(None);
        };
        let (pool, dropped_bindings) = state.slots.rebuild(&state.task_ids())?;
        for binding in &dropped_bindings {
            warn!(
                slot_id = %binding.slot,
                task_id = %binding.task_id,
                "dropping stale slot binding"
            );
        }

        let mut tasks = state.tasks;
        let interrupted_runs = self.fail_interrupted_runs(&mut tasks);
        let report = RestoreReport {
            task_count: tasks.len(),
            restored_bindings: pool.bindings().len(),
            dropped_bindings,
            interrupted_runs,
        };
        self.repository.replace_all(tasks).await?;
        self.slots.replace(pool)?;
        info!(
            task_count = report.task_count,
            restored_bindings = report.restored_bindings,
            dropped_bindings = report.dropped_bindings.len(),
            "session restored"
        );
        Ok(Some(report))
    }

    /// Forgets every task, frees every slot and deletes the stored
    /// snapshot. The pool keeps its size and root.
    ///
    /// # Errors
    ///
    /// Returns repository, slot lock or store failures.
    pub async fn reset(&self) -> SessionServiceResult<()> {
        let layout = self.slots.snapshot()?;
        self.repository.replace_all(Vec::new()).await?;
        self.slots
            .replace(SlotPool::new(layout.len(), layout.root_path())?)?;
        self.store.clear_state().await?;
        info!(slot_count = layout.len(), "session reset");
        Ok(())
    }

    fn fail_interrupted_runs(&self, tasks: &mut [Task]) -> Vec<TaskId> {
        tasks
            .iter_mut()
            .filter(|task| task.agent().run_state == AgentRunState::Running)
            .map(|task| {
                task.record_agent_failure(INTERRUPTED_RUN_LOG, AgentRunState::Failed, &*self.clock);
                warn!(task_id = %task.id(), "agent run interrupted");
                task.id().clone()
            })
            .collect()
    }
}
