//! Slot pool domain model and workspace command builder.

mod command;
mod error;
mod path;
mod slot;

pub use command::WorktreeCommand;
pub use error::SlotError;
pub use path::derive_slot_path;
pub use slot::{MAX_SLOTS, SlotId, SlotPool, WorktreeSlot};
