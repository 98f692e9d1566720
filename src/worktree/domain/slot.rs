//! Slot identities, slots and the pool that owns them.

use super::{SlotError, derive_slot_path};
use crate::task::domain::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest supported pool size.
pub const MAX_SLOTS: usize = 10;

/// Stable slot identity in `1..=MAX_SLOTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct SlotId(u16);

impl SlotId {
    /// Creates a validated slot id.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::UnknownSlot`] outside `1..=MAX_SLOTS`.
    pub fn new(value: u16) -> Result<Self, SlotError> {
        if value == 0 || usize::from(value) > MAX_SLOTS {
            return Err(SlotError::UnknownSlot(Self(value)));
        }
        Ok(Self(value))
    }

    /// Returns the numeric id.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for SlotId {
    type Error = SlotError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlotId> for u16 {
    fn from(value: SlotId) -> Self {
        value.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reusable local workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeSlot {
    id: SlotId,
    task_id: Option<TaskId>,
    path: String,
}

impl WorktreeSlot {
    /// Returns the slot id.
    #[must_use]
    pub const fn id(&self) -> SlotId {
        self.id
    }

    /// Returns the bound task, if any.
    #[must_use]
    pub const fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    /// Returns the workspace path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` when no task is bound.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.task_id.is_none()
    }
}

/// Ordered fixed-size pool of worktree slots.
///
/// The pool guarantees that a task id appears in at most one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPool {
    root_path: String,
    slots: Vec<WorktreeSlot>,
}

impl SlotPool {
    /// Creates an empty pool of `count` slots rooted at `root_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::InvalidSlotCount`] outside `1..=MAX_SLOTS` or
    /// [`SlotError::EmptyRootPath`] for a blank root.
    pub fn new(count: usize, root_path: &str) -> Result<Self, SlotError> {
        let root = validate_layout(count, root_path)?;
        let slots = slot_ids(count)
            .map(|id| WorktreeSlot {
                id,
                task_id: None,
                path: derive_slot_path(&root, id),
            })
            .collect();
        Ok(Self {
            root_path: root,
            slots,
        })
    }

    /// Rebuilds a pool from persisted bindings.
    ///
    /// Bindings to slots outside the pool and duplicate task bindings are
    /// skipped; the first binding of a task wins.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::new`].
    pub fn from_bindings(
        count: usize,
        root_path: &str,
        bindings: impl IntoIterator<Item = (SlotId, TaskId)>,
    ) -> Result<Self, SlotError> {
        let mut pool = Self::new(count, root_path)?;
        for (slot, task_id) in bindings {
            pool.assign(&task_id, slot).ok();
        }
        Ok(pool)
    }

    /// Returns the configured root path.
    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Returns every slot in ascending id order.
    #[must_use]
    pub fn slots(&self) -> &[WorktreeSlot] {
        &self.slots
    }

    /// Returns the number of slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when the pool has no slots, which a validated pool
    /// never does.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slot with `id`, if it is part of the pool.
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&WorktreeSlot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    /// Returns the slot bound to `task_id`, if any.
    #[must_use]
    pub fn slot_for_task(&self, task_id: &TaskId) -> Option<&WorktreeSlot> {
        self.slots
            .iter()
            .find(|slot| slot.task_id.as_ref() == Some(task_id))
    }

    /// Returns the free slots ordered by ascending id.
    #[must_use]
    pub fn find_free(&self) -> Vec<&WorktreeSlot> {
        self.slots.iter().filter(|slot| slot.is_free()).collect()
    }

    /// Returns `(slot, task)` pairs for every bound slot.
    #[must_use]
    pub fn bindings(&self) -> Vec<(SlotId, TaskId)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.task_id.clone().map(|task_id| (slot.id, task_id)))
            .collect()
    }

    /// Binds `task_id` to `slot` if and only if the slot is free.
    ///
    /// A slot already held by the same task counts as occupied.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::UnknownSlot`], [`SlotError::SlotOccupied`] or
    /// [`SlotError::TaskAlreadyAssigned`].
    pub fn assign(&mut self, task_id: &TaskId, slot: SlotId) -> Result<&WorktreeSlot, SlotError> {
        if let Some(existing) = self.slot_for_task(task_id) {
            if existing.id != slot {
                return Err(SlotError::TaskAlreadyAssigned {
                    task_id: task_id.clone(),
                    slot: existing.id,
                });
            }
        }
        let target = self
            .slots
            .iter_mut()
            .find(|candidate| candidate.id == slot)
            .ok_or(SlotError::UnknownSlot(slot))?;
        if let Some(bound) = &target.task_id {
            return Err(SlotError::SlotOccupied {
                slot,
                bound_task: bound.clone(),
            });
        }
        target.task_id = Some(task_id.clone());
        Ok(target)
    }

    /// Binds `task_id` to the lowest free slot.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::NoFreeSlot`] when the pool is full or
    /// [`SlotError::TaskAlreadyAssigned`] when the task holds a slot.
    pub fn assign_next_free(&mut self, task_id: &TaskId) -> Result<&WorktreeSlot, SlotError> {
        if let Some(existing) = self.slot_for_task(task_id) {
            return Err(SlotError::TaskAlreadyAssigned {
                task_id: task_id.clone(),
                slot: existing.id,
            });
        }
        let free = self
            .slots
            .iter()
            .find(|slot| slot.is_free())
            .map(WorktreeSlot::id)
            .ok_or(SlotError::NoFreeSlot)?;
        self.assign(task_id, free)
    }

    /// Clears the binding of `slot` unconditionally.
    ///
    /// Returns the task that was bound, if any. Unknown slots are ignored.
    pub fn release(&mut self, slot: SlotId) -> Option<TaskId> {
        self.slots
            .iter_mut()
            .find(|candidate| candidate.id == slot)
            .and_then(|candidate| candidate.task_id.take())
    }

    /// Clears whichever slot holds `task_id`.
    pub fn release_task(&mut self, task_id: &TaskId) -> Option<SlotId> {
        let slot = self
            .slots
            .iter_mut()
            .find(|candidate| candidate.task_id.as_ref() == Some(task_id))?;
        slot.task_id = None;
        Some(slot.id)
    }

    /// Recomputes the pool for a new size and root.
    ///
    /// Bindings of surviving slot ids are kept with recomputed paths. Slots
    /// beyond `count` are dropped and their tasks are returned in ascending
    /// slot order.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::new`]; the pool is unchanged on
    /// error.
    pub fn resize(&mut self, count: usize, root_path: &str) -> Result<Vec<TaskId>, SlotError> {
        let root = validate_layout(count, root_path)?;
        let mut previous = std::mem::take(&mut self.slots);
        let slots = slot_ids(count)
            .map(|id| WorktreeSlot {
                id,
                task_id: previous
                    .iter_mut()
                    .find(|slot| slot.id == id)
                    .and_then(|slot| slot.task_id.take()),
                path: derive_slot_path(&root, id),
            })
            .collect();
        let dropped = previous
            .into_iter()
            .filter_map(|slot| slot.task_id)
            .collect();

        self.slots = slots;
        self.root_path = root;
        Ok(dropped)
    }
}

fn validate_layout(count: usize, root_path: &str) -> Result<String, SlotError> {
    if count == 0 || count > MAX_SLOTS {
        return Err(SlotError::InvalidSlotCount(count));
    }
    let root = root_path.trim();
    if root.is_empty() {
        return Err(SlotError::EmptyRootPath);
    }
    Ok(root.to_owned())
}

fn slot_ids(count: usize) -> impl Iterator<Item = SlotId> {
    (1..=MAX_SLOTS)
        .take(count)
        .filter_map(|value| u16::try_from(value).ok())
        .map(SlotId)
}
