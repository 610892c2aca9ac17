//! Endpoint Conventions
//!
//! The bridge server listens for commands and publishes events on two
//! successive TCP ports (§6.1): `tcp://host:N` for the command channel and
//! `tcp://host:N+1` for events. [`derive_event_endpoint`] implements the
//! conversion, rejecting anything that isn't a bare `tcp://host:port`
//! endpoint the way `bridgeprotocol/utils.py::endpoints` does.

use crate::error::ProtocolError;

/// Given the control (command) endpoint, return the corresponding event
/// endpoint: the same host, with the port incremented by one.
///
/// # Errors
///
/// Returns [`ProtocolError::Configuration`] if `control_endpoint` isn't a
/// `tcp://host:port` endpoint.
pub fn derive_event_endpoint(control_endpoint: &str) -> Result<String, ProtocolError> {
    let (host, port) = parse_tcp_endpoint(control_endpoint)?;
    let event_port = port.checked_add(1).ok_or_else(|| {
        ProtocolError::Configuration(format!("port overflow deriving event endpoint from {control_endpoint}"))
    })?;
    Ok(format!("tcp://{host}:{event_port}"))
}

fn parse_tcp_endpoint(endpoint: &str) -> Result<(&str, u16), ProtocolError> {
    let rest = endpoint.strip_prefix("tcp://").ok_or_else(|| {
        ProtocolError::Configuration(format!("expected tcp:// endpoint, got: {endpoint}"))
    })?;
    let (host, port) = rest.rsplit_once(':').ok_or_else(|| {
        ProtocolError::Configuration(format!("expected tcp:// endpoint, got: {endpoint}"))
    })?;
    let port: u16 = port
        .parse()
        .map_err(|_| ProtocolError::Configuration(format!("expected tcp:// endpoint, got: {endpoint}")))?;
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_next_port() {
        assert_eq!(
            derive_event_endpoint("tcp://localhost:5555").unwrap(),
            "tcp://localhost:5556"
        );
    }

    #[test]
    fn rejects_non_tcp_endpoint() {
        assert!(derive_event_endpoint("ipc:///tmp/bridge").is_err());
        assert!(derive_event_endpoint("not-an-endpoint").is_err());
    }
}
