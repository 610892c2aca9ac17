//! CURVE Credentials
//!
//! CURVE is ZeroMQ's built-in elliptic-curve mutual authentication and
//! encryption mechanism. Keys travel the wire and this crate's API as Z85
//! text; [`CurveKeys::apply`] decodes them and configures a socket before
//! it connects (§6.1).

use crate::error::ProtocolError;

/// The three keys needed to establish a CURVE connection to the backend.
#[derive(Clone)]
pub struct CurveKeys {
    /// The server's long-term public key (Z85-encoded).
    pub server_key: String,
    /// This client's long-term public key (Z85-encoded).
    pub public_key: String,
    /// This client's long-term secret key (Z85-encoded).
    pub secret_key: String,
}

impl std::fmt::Debug for CurveKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveKeys")
            .field("server_key", &self.server_key)
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl CurveKeys {
    /// Decode the three keys from Z85 and apply them to `socket`, putting it
    /// into CURVE client mode. Must be called before `connect`.
    pub fn apply(&self, socket: &zmq::Socket) -> Result<(), ProtocolError> {
        let server_key = decode(&self.server_key)?;
        let public_key = decode(&self.public_key)?;
        let secret_key = decode(&self.secret_key)?;
        socket
            .set_curve_serverkey(&server_key)
            .map_err(|e| ProtocolError::Configuration(format!("curve_serverkey: {e}")))?;
        socket
            .set_curve_publickey(&public_key)
            .map_err(|e| ProtocolError::Configuration(format!("curve_publickey: {e}")))?;
        socket
            .set_curve_secretkey(&secret_key)
            .map_err(|e| ProtocolError::Configuration(format!("curve_secretkey: {e}")))?;
        Ok(())
    }
}

fn decode(z85: &str) -> Result<Vec<u8>, ProtocolError> {
    zmq::z85_decode(z85).map_err(|e| ProtocolError::Configuration(format!("invalid Z85 key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_impl_redacts_secret_key() {
        let keys = CurveKeys {
            server_key: "server".into(),
            public_key: "public".into(),
            secret_key: "super-secret".into(),
        };
        let debug = format!("{keys:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
