//! Errors raised by the slot pool.

use super::SlotId;
use crate::error::ErrorKind;
use crate::task::domain::TaskId;
use thiserror::Error;

/// Errors returned by slot pool operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotError {
    /// The slot id is outside the configured pool.
    #[error("slot {0} is not part of the pool")]
    UnknownSlot(SlotId),

    /// The slot is already bound to another task.
    #[error("slot {slot} is already bound to task {bound_task}")]
    SlotOccupied {
        /// Requested slot.
        slot: SlotId,
        /// Task currently holding the slot.
        bound_task: TaskId,
    },

    /// The task already holds a different slot.
    #[error("task {task_id} is already bound to slot {slot}")]
    TaskAlreadyAssigned {
        /// Task being assigned.
        task_id: TaskId,
        /// Slot the task already holds.
        slot: SlotId,
    },

    /// Every slot is bound.
    #[error("no free worktree slot is available")]
    NoFreeSlot,

    /// The requested slot count is outside `1..=MAX_SLOTS`.
    #[error("invalid slot count {0}, expected 1..=10")]
    InvalidSlotCount(usize),

    /// The root path is empty.
    #[error("worktree root path must not be empty")]
    EmptyRootPath,

    /// The shared pool lock was poisoned.
    #[error("slot pool lock poisoned")]
    LockPoisoned,
}

impl SlotError {
    /// Classifies the error for callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SlotOccupied { .. } | Self::TaskAlreadyAssigned { .. } | Self::NoFreeSlot => {
                ErrorKind::Conflict
            }
            Self::UnknownSlot(_) | Self::InvalidSlotCount(_) | Self::EmptyRootPath => {
                ErrorKind::Validation
            }
            Self::LockPoisoned => ErrorKind::Persistence,
        }
    }
}
