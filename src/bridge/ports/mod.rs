//! Port contracts for reaching the bridge.

pub mod transport;

pub use transport::{BridgeTransport, TransportError, TransportResult};
