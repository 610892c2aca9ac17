//! Event subscription: reading the SUB socket and fanning events out to
//! per-game subscribers (§4.6, §4.7).

pub mod demux;
pub mod receiver;

pub use demux::{EventDemultiplexer, Subscriber};
pub use receiver::{BridgeEvent, EventReceiver};
