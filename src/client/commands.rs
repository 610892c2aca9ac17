//! Typed Command API
//!
//! One method per server command (§4.5). Each marshals its arguments,
//! sends through the [`ReqRepCore`], decodes the reply into a domain type,
//! and is wrapped by a handshake-retry: if the server answers `ERR:UNK`,
//! the client re-sends `bridgehlo` exactly once and retries the original
//! command, no matter how many callers observed the `UNK` concurrently.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;

use crate::domain::{
    CardType, Call, Deal, DealResult, Game, GameId, PlayerId, PlayerState, PlayersInGame, Position,
};
use crate::error::{ProtocolError, Result};
use crate::framing::{self, Arguments};
use crate::merge_patch::merge_patch;
use crate::transport::{CurveKeys, SocketKind, Transport};

use super::reqrep::{FrameTransport, ReqRepCore, ZmqTransport};

/// A connected client for one bridge server connection.
///
/// Performs the handshake on [`connect`](BridgeClient::connect) and then
/// exposes the typed command set. `T` is the underlying [`FrameTransport`];
/// production code uses [`ZmqTransport`], tests can substitute a fake.
pub struct BridgeClient<T: FrameTransport + 'static> {
    core: ReqRepCore<T>,
    handshake_pending: AtomicBool,
    handshake_lock: AsyncMutex<()>,
}

impl BridgeClient<ZmqTransport> {
    /// Connect a DEALER socket to `endpoint` and perform the handshake.
    ///
    /// Closes the underlying transport and returns the error if either the
    /// connection or the handshake fails (§6.2).
    pub async fn connect(
        ctx: &zmq::Context,
        endpoint: &str,
        curve_keys: Option<&CurveKeys>,
    ) -> Result<Self> {
        let (transport, inbound) = Transport::connect(ctx, SocketKind::Dealer, endpoint, curve_keys)?;
        let client = Self::new(ZmqTransport::new(transport, inbound));
        if let Err(e) = client.hello().await {
            client.close();
            return Err(e);
        }
        Ok(client)
    }
}

impl<T: FrameTransport + 'static> BridgeClient<T> {
    /// Wrap an already-constructed transport without performing the
    /// handshake. Most callers want [`BridgeClient::connect`].
    pub fn new(transport: T) -> Self {
        Self {
            core: ReqRepCore::new(transport),
            handshake_pending: AtomicBool::new(false),
            handshake_lock: AsyncMutex::new(()),
        }
    }

    /// Close the underlying transport (idempotent).
    pub fn close(&self) {
        self.core.close();
    }

    /// Perform (or join) the handshake: sends `bridgehlo` under the
    /// connection's handshake lock, but only once regardless of how many
    /// concurrent callers request it (§4.5, §9 "handshake flag + lock").
    #[instrument(skip(self))]
    pub async fn hello(&self) -> Result<()> {
        self.handshake_pending.store(true, Ordering::Release);
        let _guard = self.handshake_lock.lock().await;
        if self.handshake_pending.swap(false, Ordering::AcqRel) {
            let mut args = Arguments::new();
            args.insert("version".into(), json!("0.1"));
            args.insert("role".into(), json!("client"));
            self.core.command("bridgehlo", &args).await?;
        }
        Ok(())
    }

    async fn with_handshake_retry<F, Fut>(&self, send: F) -> Result<Arguments>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Arguments>>,
    {
        match send().await {
            Err(ProtocolError::CommandFailure(e)) if e.is_unknown_client() => {
                self.hello().await?;
                send().await
            }
            other => other,
        }
    }

    /// Create (or look up) a game.
    pub async fn game(&self, game: Option<GameId>, args: Option<Value>) -> Result<GameId> {
        let reply = self
            .with_handshake_retry(|| {
                let mut a = Arguments::new();
                a.insert("game".into(), framing::to_value(&game));
                a.insert("args".into(), args.clone().unwrap_or(Value::Null));
                async move { self.core.command("game", &a).await }
            })
            .await?;
        require(&reply, "game", "game")
    }

    /// Join a game, optionally at a specific seat.
    pub async fn join(
        &self,
        game: Option<GameId>,
        player: Option<PlayerId>,
        position: Option<Position>,
    ) -> Result<(GameId, Position)> {
        let reply = self
            .with_handshake_retry(|| {
                let mut a = Arguments::new();
                a.insert("game".into(), framing::to_value(&game));
                a.insert("player".into(), framing::to_value(&player));
                a.insert("position".into(), framing::to_value(&position));
                async move { self.core.command("join", &a).await }
            })
            .await?;
        Ok((require(&reply, "game", "join")?, require(&reply, "position", "join")?))
    }

    /// Leave a game.
    pub async fn leave(&self, game: GameId, player: PlayerId) -> Result<Option<Position>> {
        let reply = self
            .with_handshake_retry(|| {
                let mut a = Arguments::new();
                a.insert("game".into(), framing::to_value(&game));
                a.insert("player".into(), framing::to_value(&player));
                async move { self.core.command("leave", &a).await }
            })
            .await?;
        optional(&reply, "position", "leave")
    }

    /// Fetch the full game aggregate: deal, own player state, accumulated
    /// results, and seat occupancy, in one round trip (§4.5 `get_game`).
    pub async fn get_game(&self, game: GameId, player: Option<PlayerId>) -> Result<(Game, u64)> {
        let get = vec!["pubstate", "privstate", "self", "results", "players"];
        let reply = self.raw_get(game, player, &get).await?;
        let deal = create_deal(&reply, "get")?;
        let me: PlayerState = require(&reply, "self", "get")?;
        let results: Vec<DealResult> = require(&reply, "results", "get")?;
        let players: PlayersInGame = require(&reply, "players", "get")?;
        let counter = require_counter(&reply)?;
        Ok((Game { id: game, deal, me, results, players }, counter))
    }

    /// Fetch just the current deal of a game, reconstructed from its public
    /// and private state (§4.5 `get_game_deal`).
    pub async fn get_game_deal(&self, game: GameId, player: Option<PlayerId>) -> Result<(Option<Deal>, u64)> {
        let reply = self.raw_get(game, player, &["pubstate", "privstate"]).await?;
        Ok((create_deal(&reply, "get")?, require_counter(&reply)?))
    }

    /// Fetch a deal directly by its own identifier.
    pub async fn get_deal(&self, deal: crate::domain::DealId) -> Result<Deal> {
        let reply = self
            .with_handshake_retry(|| {
                let mut a = Arguments::new();
                a.insert("deal".into(), framing::to_value(&deal));
                a.insert("get".into(), json!(["pubstate", "privstate"]));
                async move { self.core.command("get", &a).await }
            })
            .await?;
        create_deal(&reply, "get")?.ok_or_else(|| ProtocolError::invalid("get_deal: server reported no deal"))
    }

    /// Fetch the caller's own player state within a game.
    pub async fn get_self(&self, game: GameId, player: Option<PlayerId>) -> Result<(PlayerState, u64)> {
        let reply = self.raw_get(game, player, &["self"]).await?;
        Ok((require(&reply, "self", "get")?, require_counter(&reply)?))
    }

    /// Fetch the accumulated duplicate results for a game.
    pub async fn get_results(&self, game: GameId) -> Result<(Vec<DealResult>, u64)> {
        let reply = self.raw_get(game, None, &["results"]).await?;
        Ok((require(&reply, "results", "get")?, require_counter(&reply)?))
    }

    /// Fetch the seat occupancy of a game.
    pub async fn get_players(&self, game: GameId) -> Result<(PlayersInGame, u64)> {
        let reply = self.raw_get(game, None, &["players"]).await?;
        Ok((require(&reply, "players", "get")?, require_counter(&reply)?))
    }

    /// Make a call during the bidding phase.
    pub async fn call(&self, game: GameId, player: Option<PlayerId>, call: Call) -> Result<()> {
        self.with_handshake_retry(|| {
            let mut a = Arguments::new();
            a.insert("game".into(), framing::to_value(&game));
            a.insert("player".into(), framing::to_value(&player));
            a.insert("call".into(), framing::to_value(&call));
            async move { self.core.command("call", &a).await }
        })
        .await?;
        Ok(())
    }

    /// Play a card during the playing phase.
    pub async fn play(&self, game: GameId, player: Option<PlayerId>, card: CardType) -> Result<()> {
        self.with_handshake_retry(|| {
            let mut a = Arguments::new();
            a.insert("game".into(), framing::to_value(&game));
            a.insert("player".into(), framing::to_value(&player));
            a.insert("card".into(), framing::to_value(&card));
            async move { self.core.command("play", &a).await }
        })
        .await?;
        Ok(())
    }

    async fn raw_get(&self, game: GameId, player: Option<PlayerId>, get: &[&str]) -> Result<Arguments> {
        self.with_handshake_retry(|| {
            let mut a = Arguments::new();
            a.insert("game".into(), framing::to_value(&game));
            a.insert("player".into(), framing::to_value(&player));
            a.insert("get".into(), json!(get));
            async move { self.core.command("get", &a).await }
        })
        .await
    }
}

/// Pull a required field out of a reply and decode it, or fail with
/// [`ProtocolError::InvalidMessage`] naming the command for context.
fn require<V: serde::de::DeserializeOwned>(reply: &Arguments, key: &str, command: &str) -> Result<V> {
    let value = reply
        .get(key)
        .cloned()
        .ok_or_else(|| ProtocolError::invalid(format!("{command} reply missing `{key}`")))?;
    framing::from_value(value).map_err(|_| ProtocolError::invalid(format!("{command} reply field `{key}` malformed")))
}

/// Like [`require`], but a missing or `null` field decodes to `None`.
fn optional<V: serde::de::DeserializeOwned>(reply: &Arguments, key: &str, command: &str) -> Result<Option<V>> {
    match reply.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => framing::from_value(value.clone())
            .map(Some)
            .map_err(|_| ProtocolError::invalid(format!("{command} reply field `{key}` malformed"))),
    }
}

/// The `counter` field on every `get`-family reply: a required,
/// non-decreasing sequence number (§4.5 "Counter").
fn require_counter(reply: &Arguments) -> Result<u64> {
    reply
        .get("counter")
        .and_then(Value::as_u64)
        .ok_or_else(|| ProtocolError::invalid("get reply missing integer `counter`"))
}

/// Reconstruct a [`Deal`] from a `get` reply's `pubstate`/`privstate`
/// fields (§4.5 "Deal reconstruction").
///
/// `pubstate: null` means there is no current deal. A missing `privstate`
/// is treated as an empty overlay (§9 "Optional private state").
fn create_deal(reply: &Arguments, command: &str) -> Result<Option<Deal>> {
    let pubstate = reply
        .get("pubstate")
        .cloned()
        .ok_or_else(|| ProtocolError::invalid(format!("{command} reply missing `pubstate`")))?;
    if pubstate.is_null() {
        return Ok(None);
    }
    let privstate = reply.get("privstate").cloned().unwrap_or_else(|| json!({}));

    let mut merged = merge_patch(&pubstate, &privstate);
    let Value::Object(ref mut map) = merged else {
        return Err(ProtocolError::invalid(format!("{command} reply `pubstate` is not an object")));
    };
    let deal_id = map
        .remove("deal")
        .ok_or_else(|| ProtocolError::invalid(format!("{command} reply `pubstate` missing `deal`")))?;
    map.insert("id".into(), deal_id);

    let deal: Deal = serde_json::from_value(merged)
        .map_err(|e| ProtocolError::invalid(format!("{command} reply deal section malformed: {e}")))?;
    Ok(Some(deal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::reqrep::tests::FakeTransport;
    use crate::domain::{Bid, Strain};
    use std::sync::Arc;
    use uuid::Uuid;

    fn reply_frames(tag: u16, status: &str, args: &[(&str, Value)]) -> Vec<Vec<u8>> {
        let mut frames = vec![Vec::new(), tag.to_le_bytes().to_vec(), status.as_bytes().to_vec()];
        for (k, v) in args {
            frames.push(k.as_bytes().to_vec());
            frames.push(framing::encode(v));
        }
        frames
    }

    fn tag_of(sent: &[Vec<u8>]) -> u16 {
        u16::from_le_bytes([sent[1][0], sent[1][1]])
    }

    async fn wait_for_sent(
        sent: &crate::client::reqrep::tests::SentLog,
        count: usize,
    ) -> Vec<Vec<Vec<u8>>> {
        loop {
            let guard = sent.lock().unwrap();
            if guard.len() >= count {
                return guard.clone();
            }
            drop(guard);
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn game_command_decodes_returned_uuid() {
        let (fake, sent, inbound_tx) = FakeTransport::new();
        let client = Arc::new(BridgeClient::new(fake));

        let handle = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.game(None, None).await }
        });

        let game_id = Uuid::new_v4();
        let landed = wait_for_sent(&sent, 1).await;
        let tag = tag_of(&landed[0]);
        inbound_tx
            .send(reply_frames(tag, "OK", &[("game", json!(game_id))]))
            .unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), game_id);
    }

    #[tokio::test]
    async fn unknown_client_triggers_one_handshake_then_retries() {
        let (fake, sent, inbound_tx) = FakeTransport::new();
        let client = Arc::new(BridgeClient::new(fake));

        let game_id = Uuid::new_v4();
        let handle = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.join(Some(game_id), None, None).await }
        });

        // First attempt: join -> ERR:UNK.
        let landed = wait_for_sent(&sent, 1).await;
        let join_tag = tag_of(&landed[0]);
        inbound_tx
            .send(vec![Vec::new(), join_tag.to_le_bytes().to_vec(), b"ERR:UNK".to_vec()])
            .unwrap();

        // Client re-sends bridgehlo.
        let landed = wait_for_sent(&sent, 2).await;
        assert_eq!(String::from_utf8(landed[1][2].clone()).unwrap(), "bridgehlo");
        let hlo_tag = tag_of(&landed[1]);
        inbound_tx.send(reply_frames(hlo_tag, "OK", &[])).unwrap();

        // Client retries join.
        let landed = wait_for_sent(&sent, 3).await;
        assert_eq!(String::from_utf8(landed[2][2].clone()).unwrap(), "join");
        let retry_tag = tag_of(&landed[2]);
        inbound_tx
            .send(reply_frames(retry_tag, "OK", &[("game", json!(game_id)), ("position", json!("north"))]))
            .unwrap();

        let (id, position) = handle.await.unwrap().unwrap();
        assert_eq!(id, game_id);
        assert_eq!(position, Position::North);
    }

    #[tokio::test]
    async fn get_game_deal_merges_pubstate_and_privstate() {
        let (fake, sent, inbound_tx) = FakeTransport::new();
        let client = Arc::new(BridgeClient::new(fake));

        let game_id = Uuid::new_v4();
        let deal_id = Uuid::new_v4();
        let handle = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.get_game_deal(game_id, None).await }
        });

        let landed = wait_for_sent(&sent, 1).await;
        let tag = tag_of(&landed[0]);
        let pubstate = json!({
            "deal": deal_id,
            "phase": "playing",
            "cards": {"north": [null, null], "east": [null, null]},
        });
        let privstate = json!({
            "cards": {"east": [{"rank": "ace", "suit": "spades"}, {"rank": "2", "suit": "clubs"}]},
        });
        inbound_tx
            .send(reply_frames(
                tag,
                "OK",
                &[("pubstate", pubstate), ("privstate", privstate), ("counter", json!(7))],
            ))
            .unwrap();

        let (deal, counter) = handle.await.unwrap().unwrap();
        let deal = deal.unwrap();
        assert_eq!(deal.id, deal_id);
        assert_eq!(deal.cards.north, vec![None, None]);
        assert_eq!(counter, 7);
    }

    #[tokio::test]
    async fn get_game_deal_returns_none_when_pubstate_is_null() {
        let (fake, sent, inbound_tx) = FakeTransport::new();
        let client = Arc::new(BridgeClient::new(fake));

        let game_id = Uuid::new_v4();
        let handle = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.get_game_deal(game_id, None).await }
        });

        let landed = wait_for_sent(&sent, 1).await;
        let tag = tag_of(&landed[0]);
        inbound_tx
            .send(reply_frames(tag, "OK", &[("pubstate", Value::Null), ("counter", json!(1))]))
            .unwrap();

        let (deal, _) = handle.await.unwrap().unwrap();
        assert!(deal.is_none());
    }

    #[tokio::test]
    async fn missing_counter_is_invalid_message() {
        let (fake, sent, inbound_tx) = FakeTransport::new();
        let client = Arc::new(BridgeClient::new(fake));

        let game_id = Uuid::new_v4();
        let handle = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.get_results(game_id).await }
        });

        let landed = wait_for_sent(&sent, 1).await;
        let tag = tag_of(&landed[0]);
        inbound_tx.send(reply_frames(tag, "OK", &[("results", json!([]))])).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn call_sends_tagged_call_argument() {
        let (fake, sent, inbound_tx) = FakeTransport::new();
        let client = Arc::new(BridgeClient::new(fake));

        let game_id = Uuid::new_v4();
        let bid = Bid::new(Strain::Notrump, 3).unwrap();
        let handle = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.call(game_id, None, Call::bid(bid)).await }
        });

        let landed = wait_for_sent(&sent, 1).await;
        let tag = tag_of(&landed[0]);
        let args = framing::group(&landed[0][3..]).unwrap();
        assert_eq!(
            args.get("call"),
            Some(&json!({"type": "bid", "bid": {"strain": "notrump", "level": 3}}))
        );
        inbound_tx.send(reply_frames(tag, "OK", &[])).unwrap();

        handle.await.unwrap().unwrap();
    }
}
