//! Protocol Error Taxonomy
//!
//! Every command the client sends can fail with one of the kinds below.
//! `UnknownClient` never escapes the command layer: it is caught by the
//! handshake-retry wrapper in [`crate::client::commands`] and re-raised only
//! if a second attempt still fails.

use thiserror::Error;

/// Errors that can arise anywhere in the bridge protocol client.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The message received from (or about to be sent to) the server
    /// violates the wire format: wrong frame count, odd argument frames,
    /// a field with the wrong JSON shape, or an unparseable JSON blob.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The server answered a command with `ERR`.
    #[error(transparent)]
    CommandFailure(#[from] CommandFailure),

    /// Configuration was invalid before any socket I/O was attempted, e.g.
    /// a partial CURVE key triple or a non-TCP endpoint.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying ZeroMQ socket returned an I/O error.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The server rejected a command (status `ERR` or `ERR:<code>`).
///
/// Variants correspond to the error codes of §7; `UnknownClient` is a
/// client-layer recovery signal and should never be observed by callers of
/// [`crate::client::commands::BridgeClient`] — the handshake-retry decorator
/// intercepts it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    /// `ERR:UNK` — the server doesn't recognize this DEALER identity yet.
    #[error("unknown client")]
    UnknownClient,
    /// `ERR:NF` — the referenced game, deal or player doesn't exist.
    #[error("not found")]
    NotFound,
    /// `ERR:AE` — a game with the requested id already exists.
    #[error("already exists")]
    AlreadyExists,
    /// `ERR:NA` — the caller isn't authorized to perform this action.
    #[error("not authorized")]
    NotAuthorized,
    /// `ERR:SR` — the requested seat is already taken.
    #[error("seat reserved")]
    SeatReserved,
    /// `ERR:RV` — the call or play violates the rules of the game.
    #[error("rule violation")]
    RuleViolation,
    /// `ERR` with no code, or a code this client doesn't recognize.
    #[error("command failed{}", .0.as_ref().map(|c| format!(": {c}")).unwrap_or_default())]
    Other(Option<String>),
}

impl CommandFailure {
    /// Map an `ERR:<code>` suffix (or `None` for a bare `ERR`) to a variant.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("UNK") => Self::UnknownClient,
            Some("NF") => Self::NotFound,
            Some("AE") => Self::AlreadyExists,
            Some("NA") => Self::NotAuthorized,
            Some("SR") => Self::SeatReserved,
            Some("RV") => Self::RuleViolation,
            other => Self::Other(other.map(str::to_owned)),
        }
    }

    /// `true` for [`CommandFailure::UnknownClient`], used by the
    /// handshake-retry wrapper to decide whether to re-run `hello`.
    pub fn is_unknown_client(&self) -> bool {
        matches!(self, Self::UnknownClient)
    }
}

impl ProtocolError {
    /// Shorthand for constructing an [`ProtocolError::InvalidMessage`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidMessage(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
