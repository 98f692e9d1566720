//! Transport adapters.

pub mod http;
pub mod scripted;

pub use http::ReqwestBridgeTransport;
pub use scripted::{ScriptedBridgeTransport, TransportCall};
