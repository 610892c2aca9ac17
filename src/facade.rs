//! HTTP Façade Boundary
//!
//! The HTTP/WebSocket layer that fronts this client is out of scope (§1),
//! but the client owns the mapping from its own error taxonomy to the
//! status codes that façade is expected to return, and the header it
//! forwards the `get`-family counter in (§6.3, §9 "Counter header
//! semantics"). Kept framework-agnostic: no HTTP server dependency here,
//! just the policy the façade applies.

use crate::error::{CommandFailure, ProtocolError};

/// Header the façade forwards a `get`-family reply's `counter` through,
/// verbatim, to let callers reconcile snapshot reads against the event
/// stream.
pub const COUNTER_HEADER: &str = "X-Counter";

/// The HTTP status a façade should report for a given [`ProtocolError`]
/// (§6.3).
pub fn status_for_error(err: &ProtocolError) -> u16 {
    match err {
        ProtocolError::CommandFailure(CommandFailure::NotFound) => 404,
        ProtocolError::CommandFailure(CommandFailure::SeatReserved)
        | ProtocolError::CommandFailure(CommandFailure::RuleViolation) => 409,
        ProtocolError::CommandFailure(CommandFailure::UnknownClient) => {
            // Should never escape the command layer; a client bug if it does.
            500
        }
        ProtocolError::CommandFailure(_) => 400,
        // A server bug from the façade's point of view (§6.3).
        ProtocolError::InvalidMessage(_) => 500,
        ProtocolError::Configuration(_) | ProtocolError::Transport(_) => 500,
    }
}

/// Render a `get`-family counter as the `X-Counter` header value.
pub fn counter_header_value(counter: u64) -> String {
    counter.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(status_for_error(&ProtocolError::CommandFailure(CommandFailure::NotFound)), 404);
    }

    #[test]
    fn seat_reserved_and_rule_violation_map_to_409() {
        assert_eq!(status_for_error(&ProtocolError::CommandFailure(CommandFailure::SeatReserved)), 409);
        assert_eq!(status_for_error(&ProtocolError::CommandFailure(CommandFailure::RuleViolation)), 409);
    }

    #[test]
    fn other_command_failures_map_to_400() {
        assert_eq!(status_for_error(&ProtocolError::CommandFailure(CommandFailure::AlreadyExists)), 400);
        assert_eq!(status_for_error(&ProtocolError::CommandFailure(CommandFailure::NotAuthorized)), 400);
    }

    #[test]
    fn invalid_message_is_a_server_bug() {
        assert_eq!(status_for_error(&ProtocolError::invalid("boom")), 500);
    }

    #[test]
    fn counter_header_renders_as_decimal_string() {
        assert_eq!(counter_header_value(42), "42");
    }
}
