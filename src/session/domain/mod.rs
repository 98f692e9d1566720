//! Session snapshot model.

mod state;

pub use state::{SESSION_FORMAT_VERSION, SessionState, SlotBinding, SlotLayout};
