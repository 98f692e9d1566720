//! Serialisable snapshot of tasks and slot bindings.

use crate::task::domain::{Task, TaskId};
use crate::worktree::domain::{SlotError, SlotId, SlotPool};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Format version written into every snapshot.
pub const SESSION_FORMAT_VERSION: u32 = 1;

/// One persisted slot binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBinding {
    /// Bound slot.
    pub slot: SlotId,
    /// Task holding the slot.
    pub task_id: TaskId,
}

/// Pool configuration plus bindings.
///
/// Slot paths are not stored; they are derived again from the root when
/// the layout is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    /// Repository root the slot paths derive from.
    pub root_path: String,
    /// Number of slots in the pool.
    pub slot_count: usize,
    /// Bound slots in ascending slot order.
    pub bindings: Vec<SlotBinding>,
}

impl SlotLayout {
    /// Captures the layout of `pool`.
    #[must_use]
    pub fn capture(pool: &SlotPool) -> Self {
        Self {
            root_path: pool.root_path().to_owned(),
            slot_count: pool.len(),
            bindings: pool
                .bindings()
                .into_iter()
                .map(|(slot, task_id)| SlotBinding { slot, task_id })
                .collect(),
        }
    }

    /// Rebuilds a pool, keeping only bindings whose task is in `known`.
    ///
    /// Returns the pool and the bindings that were not re-applied, either
    /// because the task is unknown or because the slot no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::InvalidSlotCount`] or [`SlotError::EmptyRootPath`]
    /// when the stored layout is invalid.
    pub fn rebuild(
        &self,
        known: &HashSet<&TaskId>,
    ) -> Result<(SlotPool, Vec<SlotBinding>), SlotError> {
        let (kept, mut dropped): (Vec<&SlotBinding>, Vec<&SlotBinding>) = self
            .bindings
            .iter()
            .partition(|binding| known.contains(&binding.task_id));
        let pool = SlotPool::from_bindings(
            self.slot_count,
            &self.root_path,
            kept.iter().map(|binding| (binding.slot, binding.task_id.clone())),
        )?;
        dropped.extend(kept.into_iter().filter(|binding| {
            pool.get(binding.slot)
                .and_then(|slot| slot.task_id())
                != Some(&binding.task_id)
        }));
        Ok((pool, dropped.into_iter().cloned().collect()))
    }
}

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Snapshot format version.
    pub version: u32,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Every known task, ordered by creation time.
    pub tasks: Vec<Task>,
    /// Slot pool configuration and bindings.
    pub slots: SlotLayout,
}

impl SessionState {
    /// Captures the current tasks and pool.
    #[must_use]
    pub fn capture(tasks: Vec<Task>, pool: &SlotPool, clock: &impl Clock) -> Self {
        Self {
            version: SESSION_FORMAT_VERSION,
            saved_at: clock.utc(),
            tasks,
            slots: SlotLayout::capture(pool),
        }
    }

    /// Returns the ids of every stored task.
    #[must_use]
    pub fn task_ids(&self) -> HashSet<&TaskId> {
        self.tasks.iter().map(Task::id).collect()
    }
}
