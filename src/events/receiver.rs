//! Event Receiver
//!
//! Reads events off the SUB socket's [`FrameTransport`], parses the
//! `"<game-uuid>:<event-type>"` tag frame, and decodes the remaining
//! key/value frames into a typed [`BridgeEvent`] (§4.6).

use serde_json::Value;
use tracing::warn;

use crate::client::reqrep::FrameTransport;
use crate::domain::{
    CardType, Call, Contract, DealId, DuplicateResult, GameId, PlayerId, Position, Vulnerability,
};
use crate::error::{ProtocolError, Result};
use crate::framing::{self, Arguments};

/// One decoded event from the bridge server's event stream.
///
/// Every variant carries `game` and `counter`; the common fields are
/// duplicated onto each variant rather than factored into a shared struct,
/// matching how callers actually destructure events (one `match` arm per
/// kind of thing that happened).
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A player joined or left a seat.
    Player { game: GameId, counter: u64, position: Position, player: Option<PlayerId> },
    /// A new deal started.
    Deal { game: GameId, counter: u64, deal: DealId, opener: Position, vulnerability: Vulnerability },
    /// A new position is on turn.
    Turn { game: GameId, counter: u64, deal: DealId, position: Position },
    /// A call was made during bidding.
    Call { game: GameId, counter: u64, deal: DealId, position: Position, call: Call, index: u64 },
    /// Bidding ended and a contract was reached.
    Bidding { game: GameId, counter: u64, deal: DealId, declarer: Position, contract: Contract },
    /// A card was played.
    Play { game: GameId, counter: u64, deal: DealId, position: Position, card: CardType, trick: u64, index: u64 },
    /// The dummy's hand was revealed.
    Dummy { game: GameId, counter: u64, deal: DealId, position: Position, cards: Vec<CardType> },
    /// A trick was completed.
    Trick { game: GameId, counter: u64, deal: DealId, winner: Position, index: u64 },
    /// A deal was completed.
    DealEnd {
        game: GameId,
        counter: u64,
        deal: DealId,
        contract: Option<Contract>,
        tricks_won: Option<u32>,
        result: DuplicateResult,
    },
    /// An event type this client doesn't recognize; still surfaced rather
    /// than dropped, carrying whatever fields came with it (§4.6 "Unknown
    /// types are still surfaced").
    Other { game: GameId, counter: u64, event_type: String, fields: Arguments },
}

impl BridgeEvent {
    /// The game this event concerns.
    pub fn game(&self) -> GameId {
        match self {
            Self::Player { game, .. }
            | Self::Deal { game, .. }
            | Self::Turn { game, .. }
            | Self::Call { game, .. }
            | Self::Bidding { game, .. }
            | Self::Play { game, .. }
            | Self::Dummy { game, .. }
            | Self::Trick { game, .. }
            | Self::DealEnd { game, .. }
            | Self::Other { game, .. } => *game,
        }
    }

    /// The server-side sequence counter attached to this event. Absent on
    /// the wire decodes to `0`, matching the server's own default.
    pub fn counter(&self) -> u64 {
        match self {
            Self::Player { counter, .. }
            | Self::Deal { counter, .. }
            | Self::Turn { counter, .. }
            | Self::Call { counter, .. }
            | Self::Bidding { counter, .. }
            | Self::Play { counter, .. }
            | Self::Dummy { counter, .. }
            | Self::Trick { counter, .. }
            | Self::DealEnd { counter, .. }
            | Self::Other { counter, .. } => *counter,
        }
    }
}

/// Split an event tag into its game id and event type string.
fn parse_tag(tag: &[u8]) -> Result<(GameId, String)> {
    let tag = std::str::from_utf8(tag).map_err(|e| ProtocolError::invalid(format!("non-utf8 event tag: {e}")))?;
    let (game, event_type) = tag
        .split_once(':')
        .ok_or_else(|| ProtocolError::invalid(format!("malformed event tag: {tag}")))?;
    let game = game
        .parse::<GameId>()
        .map_err(|e| ProtocolError::invalid(format!("malformed event tag game id: {e}")))?;
    Ok((game, event_type.to_string()))
}

fn field<V: serde::de::DeserializeOwned>(fields: &Arguments, key: &str) -> Result<V> {
    let value = fields
        .get(key)
        .cloned()
        .ok_or_else(|| ProtocolError::invalid(format!("event missing field `{key}`")))?;
    framing::from_value(value).map_err(|_| ProtocolError::invalid(format!("event field `{key}` malformed")))
}

fn field_opt<V: serde::de::DeserializeOwned>(fields: &Arguments, key: &str) -> Result<Option<V>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => framing::from_value(v.clone())
            .map(Some)
            .map_err(|_| ProtocolError::invalid(format!("event field `{key}` malformed"))),
    }
}

/// Decode one raw event message: `[tag, k1, v1, ...]` (§6.1 "Event channel").
pub fn decode_event(frames: &[Vec<u8>]) -> Result<BridgeEvent> {
    let (tag_frame, kv_frames) = frames
        .split_first()
        .ok_or_else(|| ProtocolError::invalid("empty event message"))?;
    let (game, event_type) = parse_tag(tag_frame)?;
    let fields = framing::group(kv_frames)?;
    let counter = fields.get("counter").and_then(Value::as_u64).unwrap_or(0);

    let event = match event_type.as_str() {
        "player" => BridgeEvent::Player {
            game,
            counter,
            position: field(&fields, "position")?,
            player: field_opt(&fields, "player")?,
        },
        "deal" => BridgeEvent::Deal {
            game,
            counter,
            deal: field(&fields, "deal")?,
            opener: field(&fields, "opener")?,
            vulnerability: field(&fields, "vulnerability")?,
        },
        "turn" => BridgeEvent::Turn {
            game,
            counter,
            deal: field(&fields, "deal")?,
            position: field(&fields, "position")?,
        },
        "call" => BridgeEvent::Call {
            game,
            counter,
            deal: field(&fields, "deal")?,
            position: field(&fields, "position")?,
            call: field(&fields, "call")?,
            index: field(&fields, "index")?,
        },
        "bidding" => BridgeEvent::Bidding {
            game,
            counter,
            deal: field(&fields, "deal")?,
            declarer: field(&fields, "declarer")?,
            contract: field(&fields, "contract")?,
        },
        "play" => BridgeEvent::Play {
            game,
            counter,
            deal: field(&fields, "deal")?,
            position: field(&fields, "position")?,
            card: field(&fields, "card")?,
            trick: field(&fields, "trick")?,
            index: field(&fields, "index")?,
        },
        "dummy" => BridgeEvent::Dummy {
            game,
            counter,
            deal: field(&fields, "deal")?,
            position: field(&fields, "position")?,
            cards: field(&fields, "cards")?,
        },
        "trick" => BridgeEvent::Trick {
            game,
            counter,
            deal: field(&fields, "deal")?,
            winner: field(&fields, "winner")?,
            index: field(&fields, "index")?,
        },
        "dealend" => BridgeEvent::DealEnd {
            game,
            counter,
            deal: field(&fields, "deal")?,
            contract: field_opt(&fields, "contract")?,
            tricks_won: field_opt(&fields, "tricksWon")?,
            result: field(&fields, "result")?,
        },
        other => BridgeEvent::Other { game, counter, event_type: other.to_string(), fields },
    };
    Ok(event)
}

/// Reads raw event messages off a SUB-socket transport and decodes them.
pub struct EventReceiver<T: FrameTransport + 'static> {
    transport: T,
}

impl<T: FrameTransport + 'static> EventReceiver<T> {
    /// Wrap an already-connected SUB transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Receive and decode the next event.
    ///
    /// Returns [`ProtocolError::InvalidMessage`] for a malformed tag or
    /// payload; callers wanting to skip malformed messages instead should
    /// use [`EventReceiver::recv_tolerant`].
    pub async fn get_event(&self) -> Result<BridgeEvent> {
        match self.recv_one().await {
            Some(result) => result,
            None => Err(ProtocolError::Transport("event transport closed".into())),
        }
    }

    /// Receive the next event, logging and skipping malformed messages
    /// instead of failing (§4.6 "tolerant generator mode").
    ///
    /// Returns `None` once the transport has shut down.
    pub async fn recv_tolerant(&self) -> Option<BridgeEvent> {
        loop {
            match self.recv_one().await? {
                Ok(event) => return Some(event),
                Err(e) => warn!(error = %e, "discarding malformed event"),
            }
        }
    }

    /// Receive one raw message and decode it, without retrying on failure.
    /// `None` means the transport has shut down.
    pub(crate) async fn recv_one(&self) -> Option<Result<BridgeEvent>> {
        let frames = self.transport.recv().await?;
        Some(decode_event(&frames))
    }
}
