//! Domain Data Model
//!
//! Value types shared by the request/reply layer and the event layer,
//! mirroring the bridge server's own vocabulary (positions, calls, cards,
//! deal and game state). All enumerations serialize as their lowercase
//! string value, and all identifiers are UUIDs, matching the wire format
//! the server expects (§3.1).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A game identifier.
pub type GameId = Uuid;
/// A player identifier.
pub type PlayerId = Uuid;
/// A deal identifier.
pub type DealId = Uuid;

/// Seat at the bridge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    North,
    East,
    South,
    West,
}

impl Position {
    /// All four positions in clockwise dealing order, starting north.
    pub const ALL: [Position; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// The partnership this position belongs to.
    pub fn partnership(self) -> Partnership {
        match self {
            Self::North | Self::South => Partnership::NorthSouth,
            Self::East | Self::West => Partnership::EastWest,
        }
    }
}

/// A partnership of two positions sitting opposite each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partnership {
    #[serde(rename = "northSouth")]
    NorthSouth,
    #[serde(rename = "eastWest")]
    EastWest,
}

/// Strain of a bid: one of the four suits, or no-trump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strain {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
    Notrump,
}

/// Rank of a playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

/// Suit of a playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

/// A bid: a strain at a level.
///
/// `level` is constrained to `1..=7`; use [`Bid::new`] rather than
/// constructing the struct literal to get that checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bid {
    pub strain: Strain,
    level: u8,
}

/// A bid level outside `1..=7`.
#[derive(Debug, thiserror::Error)]
#[error("bid level must be between 1 and 7, got {0}")]
pub struct InvalidBidLevel(pub u8);

impl Bid {
    /// Construct a bid, rejecting a level outside `1..=7` (§3.3).
    pub fn new(strain: Strain, level: u8) -> Result<Self, InvalidBidLevel> {
        if (1..=7).contains(&level) {
            Ok(Self { strain, level })
        } else {
            Err(InvalidBidLevel(level))
        }
    }

    /// The bid level, always in `1..=7`.
    pub fn level(&self) -> u8 {
        self.level
    }
}

/// A call made during the bidding phase.
///
/// Only a `Call::Bid` carries a [`Bid`]; the other three kinds never do
/// (§3.3 "a `Call` has a `Bid` iff its kind is `bid`"). This invariant is
/// enforced by construction rather than by a separate validator, so an
/// invalid `Call` cannot be represented at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Call {
    Pass,
    Double,
    Redouble,
    Bid { bid: Bid },
}

impl Call {
    /// Build a `bid` call.
    pub fn bid(bid: Bid) -> Self {
        Self::Bid { bid }
    }

    /// The bid carried by a `Call::Bid`, or `None` otherwise.
    pub fn as_bid(&self) -> Option<&Bid> {
        match self {
            Self::Bid { bid } => Some(bid),
            _ => None,
        }
    }
}

/// Doubling status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Doubling {
    Undoubled,
    Doubled,
    Redoubled,
}

/// The contract reached at the end of bidding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contract {
    pub bid: Bid,
    pub doubling: Doubling,
}

/// A playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardType {
    pub rank: Rank,
    pub suit: Suit,
}

/// A position paired with the call it made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionCall {
    pub position: Position,
    pub call: Call,
}

/// A position paired with the card it played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionCard {
    pub position: Position,
    pub card: CardType,
}

/// A trick in the playing phase.
///
/// `cards` is `None` for a closed trick whose contents the server has
/// withheld from this player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trick {
    pub cards: Option<Vec<PositionCard>>,
    pub winner: Option<Position>,
}

/// Vulnerability of each partnership in a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(default, rename = "northSouth")]
    pub north_south: bool,
    #[serde(default, rename = "eastWest")]
    pub east_west: bool,
}

/// The cards held at each position, where known to the viewer.
///
/// `None` marks a card whose identity this player cannot see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardsInHands {
    #[serde(default)]
    pub north: Vec<Option<CardType>>,
    #[serde(default)]
    pub east: Vec<Option<CardType>>,
    #[serde(default)]
    pub south: Vec<Option<CardType>>,
    #[serde(default)]
    pub west: Vec<Option<CardType>>,
}

/// Phase of a bridge deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealPhase {
    Dealing,
    Bidding,
    Playing,
    Ended,
}

/// The reconstructed state of a single deal, as seen by one player.
///
/// One `Deal` exists per [`Game`] at a time; it is entirely replaced when
/// the server starts a new deal (a `deal` event, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub phase: DealPhase,
    #[serde(default, rename = "positionInTurn")]
    pub position_in_turn: Option<Position>,
    #[serde(default)]
    pub calls: Vec<PositionCall>,
    #[serde(default)]
    pub declarer: Option<Position>,
    #[serde(default)]
    pub contract: Option<Contract>,
    #[serde(default)]
    pub cards: CardsInHands,
    #[serde(default)]
    pub tricks: Vec<Trick>,
    #[serde(default)]
    pub vulnerability: Vulnerability,
}

/// The calling player's own private view within a deal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default, rename = "allowedCalls")]
    pub allowed_calls: Vec<Call>,
    #[serde(default, rename = "allowedCards")]
    pub allowed_cards: Vec<CardType>,
}

/// The outcome of a completed duplicate bridge deal.
///
/// A passed-out deal has no partnership and a score of zero; `score` can
/// never be negative (§3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateResult {
    pub partnership: Option<Partnership>,
    score: u32,
}

impl DuplicateResult {
    /// Construct a result. `score` is a `u32`, so non-negativity is a type
    /// invariant rather than a runtime check.
    pub fn new(partnership: Option<Partnership>, score: u32) -> Self {
        Self { partnership, score }
    }

    /// Result of a passed-out deal: no partnership, zero score.
    pub fn passed_out() -> Self {
        Self { partnership: None, score: 0 }
    }

    /// The awarded score.
    pub fn score(&self) -> u32 {
        self.score
    }
}

impl<'de> Deserialize<'de> for DuplicateResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            partnership: Option<Partnership>,
            #[serde(default)]
            score: i64,
        }
        let raw = Raw::deserialize(deserializer)?;
        let score = u32::try_from(raw.score).map_err(serde::de::Error::custom)?;
        Ok(Self { partnership: raw.partnership, score })
    }
}

/// A deal and the [`DuplicateResult`] it produced, if it has completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealResult {
    #[serde(rename = "deal")]
    pub deal_id: DealId,
    pub result: Option<DuplicateResult>,
}

/// The player occupying each seat of a game, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayersInGame {
    #[serde(default)]
    pub north: Option<PlayerId>,
    #[serde(default)]
    pub east: Option<PlayerId>,
    #[serde(default)]
    pub south: Option<PlayerId>,
    #[serde(default)]
    pub west: Option<PlayerId>,
}

impl PlayersInGame {
    /// The player at `position`, if the seat is occupied.
    pub fn at(&self, position: Position) -> Option<PlayerId> {
        match position {
            Position::North => self.north,
            Position::East => self.east,
            Position::South => self.south,
            Position::West => self.west,
        }
    }
}

/// Full state of a game from one player's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub deal: Option<Deal>,
    #[serde(rename = "self")]
    pub me: PlayerState,
    #[serde(default)]
    pub results: Vec<DealResult>,
    #[serde(default)]
    pub players: PlayersInGame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_level_must_be_in_range() {
        assert!(Bid::new(Strain::Clubs, 0).is_err());
        assert!(Bid::new(Strain::Clubs, 8).is_err());
        for level in 1..=7 {
            assert!(Bid::new(Strain::Clubs, level).is_ok());
        }
    }

    #[test]
    fn call_carries_bid_iff_kind_is_bid() {
        let bid = Bid::new(Strain::Hearts, 4).unwrap();
        let call = Call::bid(bid);
        assert!(call.as_bid().is_some());
        assert!(Call::Pass.as_bid().is_none());
        assert!(Call::Double.as_bid().is_none());
        assert!(Call::Redouble.as_bid().is_none());
    }

    #[test]
    fn call_serializes_with_lowercase_tag() {
        let json = serde_json::to_value(Call::Pass).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pass"}));

        let bid = Bid::new(Strain::Notrump, 3).unwrap();
        let json = serde_json::to_value(Call::bid(bid)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "bid", "bid": {"strain": "notrump", "level": 3}})
        );
    }

    #[test]
    fn call_deserializes_ground_truth_wire_shape() {
        // examples/original_source/backend/bridgeapp/bridgeprotocol/models.py's
        // `Call` model nests `bid` under its own key; it does not flatten
        // `strain`/`level` onto the call object itself (confirmed by
        // test_models.py:17 and test_bridgeprotocol.py:400).
        let json = serde_json::json!({"type": "bid", "bid": {"strain": "hearts", "level": 4}});
        let call: Call = serde_json::from_value(json).unwrap();
        assert_eq!(call, Call::bid(Bid::new(Strain::Hearts, 4).unwrap()));
    }

    #[test]
    fn duplicate_result_rejects_negative_score() {
        let json = serde_json::json!({"partnership": null, "score": -1});
        let result: Result<DuplicateResult, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn passed_out_result_has_no_partnership_and_zero_score() {
        let result = DuplicateResult::passed_out();
        assert_eq!(result.partnership, None);
        assert_eq!(result.score(), 0);
    }

    #[test]
    fn position_partnership_mapping() {
        assert_eq!(Position::North.partnership(), Partnership::NorthSouth);
        assert_eq!(Position::South.partnership(), Partnership::NorthSouth);
        assert_eq!(Position::East.partnership(), Partnership::EastWest);
        assert_eq!(Position::West.partnership(), Partnership::EastWest);
    }
}
