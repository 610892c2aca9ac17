//! # Bridgehlo Client
//!
//! Async Rust client for the bridgehlo contract-bridge server protocol: a
//! two-channel ZeroMQ wire protocol (DEALER command channel, SUB event
//! channel) fronting an external game engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       BRIDGEHLO CLIENT                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  transport/      - One OS thread per ZeroMQ socket             │
//! │  ├── mod.rs      - Transport/InboundFrames worker-thread bridge│
//! │  ├── curve.rs    - CURVE keypair handling                      │
//! │  └── endpoint.rs - tcp:// endpoint parsing/derivation           │
//! │                                                                │
//! │  client/         - Request/reply command channel               │
//! │  ├── reqrep.rs   - Tag correlation, pending table, receive pump │
//! │  └── commands.rs - Typed commands + handshake-retry decorator  │
//! │                                                                │
//! │  events/         - Event subscription channel                  │
//! │  ├── receiver.rs - Frame decoding into BridgeEvent              │
//! │  └── demux.rs    - Per-game fan-out over one shared pump        │
//! │                                                                │
//! │  domain.rs       - Positions, calls, cards, deals, games        │
//! │  framing.rs      - Arguments <-> flattened key/value frames     │
//! │  merge_patch.rs  - RFC 7396 JSON Merge Patch                    │
//! │  error.rs        - ProtocolError / CommandFailure taxonomy      │
//! │  config.rs       - Endpoint + CURVE credential configuration    │
//! │  facade.rs       - Error-to-HTTP-status mapping for a front end │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency model
//!
//! Each socket is owned exclusively by one worker thread (ZeroMQ sockets
//! cannot be shared across threads); everything above that boundary is
//! plain `async`/`await` over Tokio channels. The command channel
//! correlates replies to requests by a 16-bit tag and tolerates
//! out-of-order completion. The event channel runs a single shared pump
//! that fans events out to per-game subscribers, so the number of
//! subscribers never multiplies the number of socket reads.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod facade;
pub mod framing;
pub mod merge_patch;
pub mod transport;

pub use client::{BridgeClient, FrameTransport, ZmqTransport};
pub use config::ClientConfig;
pub use error::{CommandFailure, ProtocolError, Result};
pub use events::{BridgeEvent, EventDemultiplexer, EventReceiver, Subscriber};
pub use transport::CurveKeys;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
