//! Transport Socket
//!
//! Owns exactly one ZeroMQ socket (DEALER for the command channel, SUB
//! pre-subscribed to the empty prefix for events) and exposes an async
//! send/receive interface to the rest of the crate (§4.2).
//!
//! ZeroMQ sockets may only be touched from the thread that created them, so
//! each [`Transport`] spawns a dedicated OS thread that owns the `zmq::Socket`
//! exclusively. The async side talks to it over two channels: a
//! `std::sync::mpsc` queue of outbound frame lists, and a `tokio::sync::mpsc`
//! unbounded channel of inbound frame lists. This keeps the "one reactor, one
//! socket, one thread" invariant of §5 without requiring the rest of the
//! crate to know anything about threads.

pub mod curve;
pub mod endpoint;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::ProtocolError;
pub use curve::CurveKeys;
pub use endpoint::derive_event_endpoint;

/// How long the worker thread blocks waiting for an incoming message before
/// checking for outbound work or a close request again.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The kind of socket a [`Transport`] wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// DEALER socket used by the command channel.
    Dealer,
    /// SUB socket, pre-subscribed to the empty prefix, used by the event
    /// channel.
    Sub,
}

struct SendRequest {
    frames: Vec<Vec<u8>>,
    ack: oneshot::Sender<Result<(), ProtocolError>>,
}

/// A handle to a background-owned ZeroMQ socket.
///
/// Cloning a `Transport` shares the same underlying socket and worker
/// thread; only the owner that receives [`Transport::split`]'s inbound half
/// should read from it, since the inbound channel has a single consumer.
pub struct Transport {
    send_tx: std::sync::mpsc::Sender<SendRequest>,
    closed: Arc<AtomicBool>,
}

/// The exclusive, receive-only half of a [`Transport`], yielding frame lists
/// as they arrive.
pub struct InboundFrames {
    rx: mpsc::UnboundedReceiver<Vec<Vec<u8>>>,
}

impl InboundFrames {
    /// Wait for the next inbound multi-frame message.
    ///
    /// Returns `None` once the worker thread has shut down (socket closed or
    /// a fatal transport error) and no more messages will arrive.
    pub async fn recv(&mut self) -> Option<Vec<Vec<u8>>> {
        self.rx.recv().await
    }
}

impl Transport {
    /// Create the underlying socket, configure CURVE if given, connect to
    /// `endpoint`, and spawn the worker thread that owns it from then on.
    pub fn connect(
        ctx: &zmq::Context,
        kind: SocketKind,
        endpoint: &str,
        curve_keys: Option<&CurveKeys>,
    ) -> Result<(Self, InboundFrames), ProtocolError> {
        let socket_type = match kind {
            SocketKind::Dealer => zmq::DEALER,
            SocketKind::Sub => zmq::SUB,
        };
        let socket = ctx
            .socket(socket_type)
            .map_err(|e| ProtocolError::Transport(format!("socket(): {e}")))?;

        if let Some(keys) = curve_keys {
            keys.apply(&socket)?;
        }

        if kind == SocketKind::Sub {
            socket
                .set_subscribe(b"")
                .map_err(|e| ProtocolError::Transport(format!("set_subscribe: {e}")))?;
        }

        socket
            .connect(endpoint)
            .map_err(|e| ProtocolError::Transport(format!("connect({endpoint}): {e}")))?;

        let (send_tx, send_rx) = std::sync::mpsc::channel::<SendRequest>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let worker_closed = Arc::clone(&closed);
        std::thread::Builder::new()
            .name(format!("zmq-transport-{endpoint}"))
            .spawn(move || worker_loop(socket, send_rx, inbound_tx, worker_closed))
            .map_err(|e| ProtocolError::Transport(format!("spawning transport thread: {e}")))?;

        Ok((Self { send_tx, closed }, InboundFrames { rx: inbound_rx }))
    }

    /// Send a multi-frame message. Resolves once the worker thread has
    /// handed it to `zmq_send`, not once the peer has received it.
    pub async fn send(&self, frames: Vec<Vec<u8>>) -> Result<(), ProtocolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProtocolError::Transport("transport is closed".into()));
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send_tx
            .send(SendRequest { frames, ack: ack_tx })
            .map_err(|_| ProtocolError::Transport("transport worker thread is gone".into()))?;
        ack_rx
            .await
            .map_err(|_| ProtocolError::Transport("transport worker thread dropped the ack".into()))?
    }

    /// Signal the worker thread to stop and close the socket. Idempotent
    /// (§4.2 "closure is idempotent").
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

fn worker_loop(
    socket: zmq::Socket,
    send_rx: std::sync::mpsc::Receiver<SendRequest>,
    inbound_tx: mpsc::UnboundedSender<Vec<Vec<u8>>>,
    closed: Arc<AtomicBool>,
) {
    loop {
        if closed.load(Ordering::Acquire) {
            break;
        }

        while let Ok(req) = send_rx.try_recv() {
            let result = socket
                .send_multipart(req.frames, 0)
                .map_err(|e| ProtocolError::Transport(format!("send_multipart: {e}")));
            let _ = req.ack.send(result);
        }

        match socket.recv_multipart(zmq::DONTWAIT) {
            Ok(frames) => {
                if inbound_tx.send(frames).is_err() {
                    debug!("transport inbound consumer gone, stopping worker");
                    break;
                }
                continue;
            }
            Err(zmq::Error::EAGAIN) => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!(error = %e, "transport recv error, stopping worker");
                break;
            }
        }
    }
    let _ = socket.set_linger(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_idempotent() {
        let closed = Arc::new(AtomicBool::new(false));
        let (_tx, _rx) = std::sync::mpsc::channel::<SendRequest>();
        // Exercise the flag directly; spinning up a real socket/thread pair
        // belongs in an integration test against a live ZeroMQ context.
        closed.store(true, Ordering::Release);
        closed.store(true, Ordering::Release);
        assert!(closed.load(Ordering::Acquire));
    }
}
