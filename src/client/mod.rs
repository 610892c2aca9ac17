//! Typed client for one bridge server connection.
//!
//! [`reqrep`] implements tag-based request/reply correlation over an
//! injectable [`reqrep::FrameTransport`]; [`commands`] builds the server's
//! typed command set on top of it, including the handshake-retry wrapper
//! (§4.4, §4.5).

pub mod commands;
pub mod reqrep;

pub use commands::BridgeClient;
pub use reqrep::{FrameTransport, ZmqTransport};
