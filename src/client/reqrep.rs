//! Request/Reply Core
//!
//! Tags each outbound command with a 16-bit correlation id, keeps a table of
//! pending replies, and runs a background pump that demultiplexes inbound
//! replies to the right awaiter regardless of arrival order (§4.4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, instrument, warn};

use crate::error::{CommandFailure, ProtocolError, Result};
use crate::framing::{self, Arguments};
use crate::transport::{InboundFrames, Transport};

/// Abstraction over "something that moves multi-frame messages", so the
/// request/reply core can be exercised in tests without a real ZeroMQ
/// socket. [`ZmqTransport`] is the production implementation.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Send one multi-frame message.
    async fn send(&self, frames: Vec<Vec<u8>>) -> Result<()>;
    /// Receive the next multi-frame message, or `None` if the transport has
    /// shut down. Only the receive pump ever calls this.
    async fn recv(&self) -> Option<Vec<Vec<u8>>>;
    /// Close the transport. Idempotent; a no-op by default for transports
    /// with nothing to release eagerly.
    fn close(&self) {}
}

/// Production [`FrameTransport`] backed by a DEALER [`Transport`].
pub struct ZmqTransport {
    transport: Transport,
    inbound: Mutex<InboundFrames>,
}

impl ZmqTransport {
    /// Wrap an already-connected DEALER transport.
    pub fn new(transport: Transport, inbound: InboundFrames) -> Self {
        Self { transport, inbound: Mutex::new(inbound) }
    }
}

#[async_trait]
impl FrameTransport for ZmqTransport {
    async fn send(&self, frames: Vec<Vec<u8>>) -> Result<()> {
        self.transport.send(frames).await
    }

    async fn recv(&self) -> Option<Vec<Vec<u8>>> {
        self.inbound.lock().await.recv().await
    }

    fn close(&self) {
        self.transport.close();
    }
}

type PendingTable = HashMap<u16, oneshot::Sender<Result<Arguments>>>;

/// Tag allocator, pending-reply table, and receive pump for one DEALER
/// connection.
///
/// Multiple commands may be outstanding concurrently; replies are routed
/// purely by tag, with no assumption about arrival order (§4.4 "Safety").
pub struct ReqRepCore<T: FrameTransport + 'static> {
    transport: Arc<T>,
    pending: Arc<Mutex<PendingTable>>,
    next_tag: AtomicU16,
    pump_running: Arc<std::sync::atomic::AtomicBool>,
}

impl<T: FrameTransport + 'static> ReqRepCore<T> {
    /// Wrap a transport. No pump runs until the first command is sent.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_tag: AtomicU16::new(0),
            pump_running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Send `command` with `args` and await the decoded reply arguments.
    ///
    /// Dropping the returned future before it resolves cancels the
    /// awaiter: the pending-table entry is removed and a reply that arrives
    /// afterwards is silently dropped (§4.4 "Cancellation").
    #[instrument(skip(self, args), fields(command))]
    pub async fn command(&self, command: &str, args: &Arguments) -> Result<Arguments> {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().await;
            pending.insert(tag, reply_tx);
            if pending.len() == 1 {
                self.spawn_pump();
            }
        }

        let mut frames = vec![Vec::new(), tag.to_le_bytes().to_vec(), command.as_bytes().to_vec()];
        frames.extend(framing::flatten(args));

        if let Err(e) = self.transport.send(frames).await {
            self.pending.lock().await.remove(&tag);
            return Err(e);
        }

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Transport(
                "receive pump stopped before a reply arrived".into(),
            )),
        }
    }

    /// Close the underlying transport (§4.2 "closure is idempotent").
    pub fn close(&self) {
        self.transport.close();
    }

    fn spawn_pump(&self) {
        if self.pump_running.swap(true, Ordering::AcqRel) {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let pending = Arc::clone(&self.pending);
        let pump_running = Arc::clone(&self.pump_running);
        tokio::spawn(async move {
            receive_pump(transport, pending, pump_running).await;
        });
    }
}

/// Loop receiving replies and dispatching them to their awaiter by tag,
/// until the pending table drains or the transport shuts down (§4.4).
async fn receive_pump<T: FrameTransport + 'static>(
    transport: Arc<T>,
    pending: Arc<Mutex<PendingTable>>,
    pump_running: Arc<std::sync::atomic::AtomicBool>,
) {
    loop {
        if pending.lock().await.is_empty() {
            break;
        }

        let Some(frames) = transport.recv().await else {
            debug!("transport closed, ending receive pump");
            break;
        };

        if frames.len() < 2 {
            warn!(frame_count = frames.len(), "discarding reply: too few frames");
            continue;
        }

        let tag = u16::from_le_bytes(tag_bytes(&frames[1]));

        let Some(reply_tx) = pending.lock().await.remove(&tag) else {
            warn!(tag, "discarding reply: unknown tag");
            continue;
        };

        if reply_tx.is_closed() {
            // Awaiter was cancelled before the reply arrived; drop it.
            continue;
        }

        let outcome = decode_reply(&frames);
        let _ = reply_tx.send(outcome);
    }
    pump_running.store(false, Ordering::Release);
}

fn tag_bytes(frame: &[u8]) -> [u8; 2] {
    [frame.first().copied().unwrap_or(0), frame.get(1).copied().unwrap_or(0)]
}

/// Decode a `[empty, tag, status, k1, v1, ...]` reply into its argument map,
/// or the appropriate error (§4.4 steps 5-8).
fn decode_reply(frames: &[Vec<u8>]) -> Result<Arguments> {
    if frames.len() < 3 {
        return Err(ProtocolError::invalid("missing status frame in reply"));
    }
    let status = &frames[2];
    let arg_frames = &frames[3..];
    if arg_frames.len() % 2 != 0 {
        return Err(ProtocolError::invalid("odd number of argument frames in reply"));
    }
    if !framing::status_is_ok(status) {
        let code = framing::error_code(status);
        return Err(ProtocolError::CommandFailure(CommandFailure::from_code(code.as_deref())));
    }
    framing::group(arg_frames)
}
