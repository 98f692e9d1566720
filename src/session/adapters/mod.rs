//! Session store adapters.

mod json_file;
mod memory;

pub use json_file::{JsonFileSessionStore, SESSION_FILE_NAME};
pub use memory::InMemorySessionStore;
