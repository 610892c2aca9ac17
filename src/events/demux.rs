//! Event Demultiplexer
//!
//! Lets many logical subscribers, keyed by game id, share one underlying
//! [`EventReceiver`]. A single pump task drains the receiver and fans each
//! event out to the subscribers registered for its game; the pump's
//! lifetime is tied to whether the subscriber map is non-empty, not to any
//! one subscriber (§4.7, §9 "Demultiplexer subscription").

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc;
use tracing::warn;

use crate::client::reqrep::FrameTransport;
use crate::domain::GameId;

use super::receiver::{BridgeEvent, EventReceiver};

struct SubscriberHandle {
    id: u64,
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

type SubscriberMap = HashMap<GameId, Vec<SubscriberHandle>>;

/// Fans events out to per-game subscribers over a single shared pump task.
pub struct EventDemultiplexer<T: FrameTransport + 'static> {
    receiver: Arc<EventReceiver<T>>,
    subscribers: Arc<StdMutex<SubscriberMap>>,
    next_id: AtomicU64,
    pump_running: Arc<AtomicBool>,
}

impl<T: FrameTransport + 'static> EventDemultiplexer<T> {
    /// Wrap a receiver. No pump runs until the first subscription.
    pub fn new(receiver: EventReceiver<T>) -> Self {
        Self {
            receiver: Arc::new(receiver),
            subscribers: Arc::new(StdMutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            pump_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register interest in `game_id`'s events. If this is the first
    /// subscriber overall, (re)spawns the pump task.
    pub fn subscribe(&self, game_id: GameId) -> Subscriber {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let was_empty = {
            let mut subs = self.subscribers.lock().unwrap();
            let was_empty = subs.is_empty();
            subs.entry(game_id).or_default().push(SubscriberHandle { id, tx });
            was_empty
        };
        if was_empty {
            self.spawn_pump();
        }

        Subscriber { id, game_id, rx, subscribers: Arc::clone(&self.subscribers) }
    }

    fn spawn_pump(&self) {
        if self.pump_running.swap(true, Ordering::AcqRel) {
            return;
        }
        let receiver = Arc::clone(&self.receiver);
        let subscribers = Arc::clone(&self.subscribers);
        let pump_running = Arc::clone(&self.pump_running);
        tokio::spawn(async move {
            pump(receiver, subscribers, pump_running).await;
        });
    }
}

/// Owning handle to one subscription. Dropping it unsubscribes (§9).
pub struct Subscriber {
    id: u64,
    game_id: GameId,
    rx: mpsc::UnboundedReceiver<BridgeEvent>,
    subscribers: Arc<StdMutex<SubscriberMap>>,
}

impl Subscriber {
    /// The game this subscriber watches.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Wait for the next event delivered to this subscriber.
    ///
    /// Returns `None` once the pump has stopped and no more events will
    /// arrive — queued events delivered before shutdown are still consumed
    /// first (§4.7 "Failure tolerance").
    pub async fn get_event(&mut self) -> Option<BridgeEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        let mut subs = self.subscribers.lock().unwrap();
        if let Some(list) = subs.get_mut(&self.game_id) {
            list.retain(|h| h.id != self.id);
            if list.is_empty() {
                subs.remove(&self.game_id);
            }
        }
    }
}

/// Loop receiving events and fanning each out to its game's subscribers,
/// until the subscriber map drains or the receiver shuts down.
async fn pump<T: FrameTransport + 'static>(
    receiver: Arc<EventReceiver<T>>,
    subscribers: Arc<StdMutex<SubscriberMap>>,
    pump_running: Arc<AtomicBool>,
) {
    loop {
        if subscribers.lock().unwrap().is_empty() {
            break;
        }

        let Some(outcome) = receiver.recv_one().await else {
            break;
        };

        let event = match outcome {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "discarding malformed event in demultiplexer pump");
                continue;
            }
        };

        let subs = subscribers.lock().unwrap();
        if let Some(list) = subs.get(&event.game()) {
            for sub in list {
                // Unbounded and non-blocking; a lagging subscriber cannot
                // stall delivery to others.
                let _ = sub.tx.send(event.clone());
            }
        }
        drop(subs);

        // Yield once per event so a subscribe racing with delivery can
        // register before the next receive.
        tokio::task::yield_now().await;
    }
    pump_running.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::reqrep::tests::FakeTransport;
    use uuid::Uuid;

    fn event_frames(tag: &str, fields: &[(&str, serde_json::Value)]) -> Vec<Vec<u8>> {
        let mut frames = vec![tag.as_bytes().to_vec()];
        for (k, v) in fields {
            frames.push(k.as_bytes().to_vec());
            frames.push(crate::framing::encode(v));
        }
        frames
    }

    #[tokio::test]
    async fn fans_out_by_game_and_preserves_per_game_order() {
        let (fake, _sent, inbound_tx) = FakeTransport::new();
        let demux = EventDemultiplexer::new(EventReceiver::new(fake));

        let g1 = Uuid::new_v4();
        let g2 = Uuid::new_v4();
        let deal1 = Uuid::new_v4();
        let deal2 = Uuid::new_v4();
        let mut g1_a = demux.subscribe(g1);
        let mut g1_b = demux.subscribe(g1);
        let mut g2_sub = demux.subscribe(g2);

        inbound_tx
            .send(event_frames(
                &format!("{g1}:turn"),
                &[("deal", serde_json::json!(deal1)), ("position", serde_json::json!("north"))],
            ))
            .unwrap();
        inbound_tx
            .send(event_frames(
                &format!("{g2}:turn"),
                &[("deal", serde_json::json!(deal2)), ("position", serde_json::json!("east"))],
            ))
            .unwrap();
        inbound_tx
            .send(event_frames(
                &format!("{g1}:trick"),
                &[
                    ("deal", serde_json::json!(deal1)),
                    ("winner", serde_json::json!("south")),
                    ("index", serde_json::json!(1)),
                ],
            ))
            .unwrap();

        let first = g1_a.get_event().await.unwrap();
        let second = g1_a.get_event().await.unwrap();
        assert!(matches!(first, BridgeEvent::Turn { .. }));
        assert!(matches!(second, BridgeEvent::Trick { .. }));

        let b_first = g1_b.get_event().await.unwrap();
        assert!(matches!(b_first, BridgeEvent::Turn { .. }));

        let g2_first = g2_sub.get_event().await.unwrap();
        assert!(matches!(g2_first, BridgeEvent::Turn { .. }));
        assert_eq!(g2_first.game(), g2);
    }

    #[tokio::test]
    async fn unsubscribing_one_subscriber_does_not_affect_others() {
        let (fake, _sent, inbound_tx) = FakeTransport::new();
        let demux = EventDemultiplexer::new(EventReceiver::new(fake));

        let g1 = Uuid::new_v4();
        let deal = Uuid::new_v4();
        let sub_a = demux.subscribe(g1);
        let mut sub_b = demux.subscribe(g1);

        drop(sub_a);

        inbound_tx
            .send(event_frames(
                &format!("{g1}:turn"),
                &[("deal", serde_json::json!(deal)), ("position", serde_json::json!("west"))],
            ))
            .unwrap();

        let event = sub_b.get_event().await.unwrap();
        assert!(matches!(event, BridgeEvent::Turn { .. }));
    }

    #[tokio::test]
    async fn malformed_event_is_skipped_without_stopping_the_pump() {
        let (fake, _sent, inbound_tx) = FakeTransport::new();
        let demux = EventDemultiplexer::new(EventReceiver::new(fake));

        let g1 = Uuid::new_v4();
        let deal = Uuid::new_v4();
        let mut sub = demux.subscribe(g1);

        inbound_tx.send(vec![b"invalid-tag".to_vec()]).unwrap();
        inbound_tx
            .send(event_frames(
                &format!("{g1}:turn"),
                &[("deal", serde_json::json!(deal)), ("position", serde_json::json!("north"))],
            ))
            .unwrap();

        let event = sub.get_event().await.unwrap();
        assert!(matches!(event, BridgeEvent::Turn { .. }));
    }
}
