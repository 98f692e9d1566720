//! Shared slot allocator with check-then-act atomicity.

use crate::task::domain::TaskId;
use crate::worktree::domain::{SlotError, SlotId, SlotPool, WorktreeSlot};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Thread-safe owner of the slot pool.
///
/// Every mutating operation observes and updates the pool under one write
/// lock, so two concurrent assignments of the same slot are resolved here
/// rather than by command ordering.
#[derive(Debug)]
pub struct WorktreeSlotAllocator {
    pool: RwLock<SlotPool>,
}

impl WorktreeSlotAllocator {
    /// Creates an allocator around `pool`.
    #[must_use]
    pub const fn new(pool: SlotPool) -> Self {
        Self {
            pool: RwLock::new(pool),
        }
    }

    /// Creates an allocator with `count` free slots rooted at `root_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::InvalidSlotCount`] or [`SlotError::EmptyRootPath`].
    pub fn with_layout(count: usize, root_path: &str) -> Result<Self, SlotError> {
        SlotPool::new(count, root_path).map(Self::new)
    }

    /// Binds `task_id` to `slot` if the slot is free.
    ///
    /// # Errors
    ///
    /// Returns the pool's assignment errors or [`SlotError::LockPoisoned`].
    pub fn assign(&self, task_id: &TaskId, slot: SlotId) -> Result<WorktreeSlot, SlotError> {
        let mut pool = self.write()?;
        let assigned = pool.assign(task_id, slot)?.clone();
        debug!(task_id = %task_id, slot_id = %slot, path = assigned.path(), "slot assigned");
        Ok(assigned)
    }

    /// Binds `task_id` to the lowest free slot.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::NoFreeSlot`], [`SlotError::TaskAlreadyAssigned`]
    /// or [`SlotError::LockPoisoned`].
    pub fn assign_next_free(&self, task_id: &TaskId) -> Result<WorktreeSlot, SlotError> {
        let mut pool = self.write()?;
        let assigned = pool.assign_next_free(task_id)?.clone();
        debug!(task_id = %task_id, slot_id = %assigned.id(), path = assigned.path(), "slot assigned");
        Ok(assigned)
    }

    /// Clears the binding of `slot`; returns the task that held it.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::LockPoisoned`].
    pub fn release(&self, slot: SlotId) -> Result<Option<TaskId>, SlotError> {
        let released = self.write()?.release(slot);
        debug!(slot_id = %slot, released = ?released, "slot released");
        Ok(released)
    }

    /// Clears whichever slot holds `task_id`; returns that slot.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::LockPoisoned`].
    pub fn release_task(&self, task_id: &TaskId) -> Result<Option<SlotId>, SlotError> {
        let released = self.write()?.release_task(task_id);
        debug!(task_id = %task_id, slot_id = ?released, "task slot released");
        Ok(released)
    }

    /// Applies a new slot count and root path.
    ///
    /// Returns the tasks whose slots were dropped.
    ///
    /// # Errors
    ///
    /// Returns the pool's layout errors or [`SlotError::LockPoisoned`].
    pub fn reconfigure(&self, count: usize, root_path: &str) -> Result<Vec<TaskId>, SlotError> {
        let dropped = self.write()?.resize(count, root_path)?;
        info!(slot_count = count, root_path, dropped = dropped.len(), "slot pool reconfigured");
        Ok(dropped)
    }

    /// Returns the free slots ordered by ascending id.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::LockPoisoned`].
    pub fn find_free(&self) -> Result<Vec<WorktreeSlot>, SlotError> {
        Ok(self.read()?.find_free().into_iter().cloned().collect())
    }

    /// Returns the slot bound to `task_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::LockPoisoned`].
    pub fn slot_for_task(&self, task_id: &TaskId) -> Result<Option<WorktreeSlot>, SlotError> {
        Ok(self.read()?.slot_for_task(task_id).cloned())
    }

    /// Returns the repository root the slot paths are derived from.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::LockPoisoned`].
    pub fn root_path(&self) -> Result<String, SlotError> {
        Ok(self.read()?.root_path().to_owned())
    }

    /// Returns a copy of the whole pool.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::LockPoisoned`].
    pub fn snapshot(&self) -> Result<SlotPool, SlotError> {
        Ok(self.read()?.clone())
    }

    /// Replaces the whole pool, as done when a session is restored.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::LockPoisoned`].
    pub fn replace(&self, pool: SlotPool) -> Result<(), SlotError> {
        *self.write()? = pool;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SlotPool>, SlotError> {
        self.pool
            .read()
            .map_err(|_: PoisonError<_>| SlotError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SlotPool>, SlotError> {
        self.pool
            .write()
            .map_err(|_: PoisonError<_>| SlotError::LockPoisoned)
    }
}
