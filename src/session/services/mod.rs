//! Session save, restore and reset.

mod error;
mod session;

pub use error::{SessionServiceError, SessionServiceResult};
pub use session::{RestoreReport, SessionService};
