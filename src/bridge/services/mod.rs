//! Dispatcher and poller services.

mod dispatcher;
mod poller;

pub use dispatcher::{CommandDispatcher, DispatcherSettings};
pub use poller::{JobPoller, PollSettings};
