//! Client Configuration
//!
//! Endpoint and credential setup shared by the command and event
//! connections. Mirrors the teacher's `AuthConfig::from_env` pattern: a
//! typed config struct with a fallible `from_env` constructor, so a missing
//! or malformed environment is a [`ProtocolError::Configuration`] rather
//! than a panic.

use std::env;

use crate::error::{ProtocolError, Result};
use crate::transport::{derive_event_endpoint, CurveKeys};

const ENV_ENDPOINT: &str = "BRIDGEHLO_ENDPOINT";
const ENV_CURVE_SERVERKEY: &str = "BRIDGEHLO_CURVE_SERVERKEY";
const ENV_CURVE_PUBLICKEY: &str = "BRIDGEHLO_CURVE_PUBLICKEY";
const ENV_CURVE_SECRETKEY: &str = "BRIDGEHLO_CURVE_SECRETKEY";

/// Everything needed to open a connection to the bridge server.
#[derive(Clone)]
pub struct ClientConfig {
    /// The command channel endpoint, e.g. `tcp://localhost:5555`.
    pub command_endpoint: String,
    /// The event channel endpoint, derived from `command_endpoint` unless
    /// overridden.
    pub event_endpoint: String,
    /// CURVE credentials, if the connection requires mutual authentication.
    pub curve_keys: Option<CurveKeys>,
}

impl ClientConfig {
    /// Build a config directly from a command endpoint, deriving the event
    /// endpoint by incrementing its port (§6.1 "Endpoint conventions").
    pub fn new(command_endpoint: impl Into<String>, curve_keys: Option<CurveKeys>) -> Result<Self> {
        let command_endpoint = command_endpoint.into();
        let event_endpoint = derive_event_endpoint(&command_endpoint)?;
        Ok(Self { command_endpoint, event_endpoint, curve_keys })
    }

    /// Read configuration from the environment:
    ///
    /// - `BRIDGEHLO_ENDPOINT` (required): the command channel endpoint.
    /// - `BRIDGEHLO_CURVE_SERVERKEY`, `BRIDGEHLO_CURVE_PUBLICKEY`,
    ///   `BRIDGEHLO_CURVE_SECRETKEY` (all-or-nothing): CURVE credentials.
    ///
    /// A partial CURVE triple is a [`ProtocolError::Configuration`] (§6.1
    /// "All or none must be provided; partial is a configuration error.").
    pub fn from_env() -> Result<Self> {
        let command_endpoint = env::var(ENV_ENDPOINT)
            .map_err(|_| ProtocolError::Configuration(format!("{ENV_ENDPOINT} is not set")))?;

        let server_key = env::var(ENV_CURVE_SERVERKEY).ok();
        let public_key = env::var(ENV_CURVE_PUBLICKEY).ok();
        let secret_key = env::var(ENV_CURVE_SECRETKEY).ok();

        let curve_keys = match (server_key, public_key, secret_key) {
            (None, None, None) => None,
            (Some(server_key), Some(public_key), Some(secret_key)) => {
                Some(CurveKeys { server_key, public_key, secret_key })
            }
            _ => {
                return Err(ProtocolError::Configuration(format!(
                    "{ENV_CURVE_SERVERKEY}/{ENV_CURVE_PUBLICKEY}/{ENV_CURVE_SECRETKEY} must be set together or not at all"
                )))
            }
        };

        Self::new(command_endpoint, curve_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_event_endpoint() {
        let config = ClientConfig::new("tcp://localhost:5555", None).unwrap();
        assert_eq!(config.event_endpoint, "tcp://localhost:5556");
    }

    #[test]
    fn new_rejects_non_tcp_endpoint() {
        assert!(ClientConfig::new("ipc:///tmp/bridge", None).is_err());
    }
}
