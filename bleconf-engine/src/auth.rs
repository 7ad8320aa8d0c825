//! Token authorization gate.
//!
//! Every command except token rotation carries an envelope of
//! `[token_len:u8][token:32 bytes]` at the start of the frame body.
//! The gate validates that envelope against the stored session token
//! and controls when the token may be rotated: only while the device
//! is in the ConfiguringWifi mode that provisioning puts it in.

use bleconf_protocol::{Status, TOKEN_LEN};
use tracing::{debug, info};

/// Result of checking a frame's authorization envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Envelope valid; payload starts at the given body offset.
    Authorized { payload_offset: usize },
    /// token_len was not exactly 32 (status 2 response).
    BadStructure,
    /// Token did not match the stored value (status 1 response).
    Mismatch,
}

/// Session authorization state: the stored token and the configuring
/// mode flag.
#[derive(Debug, Clone)]
pub struct AuthGate {
    token: String,
    configuring: bool,
}

impl AuthGate {
    pub fn new(token: String, configuring: bool) -> Self {
        Self { token, configuring }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_configuring(&self) -> bool {
        self.configuring
    }

    /// Enters ConfiguringWifi mode, optionally erasing the stored token
    /// so a fresh one must be rotated in.
    pub fn enter_configuring(&mut self, erase_token: bool) {
        self.configuring = true;
        if erase_token {
            self.token.clear();
        }
        info!(erase_token, "entering configuring mode");
    }

    /// Leaves ConfiguringWifi mode. Called by the handler that
    /// finalizes remote-endpoint configuration, not automatically.
    pub fn exit_configuring(&mut self) {
        self.configuring = false;
        info!("leaving configuring mode");
    }

    /// Validates the authorization envelope at the start of `body`.
    pub fn authorize(&self, body: &[u8]) -> AuthOutcome {
        if body.is_empty() || body[0] as usize != TOKEN_LEN {
            return AuthOutcome::BadStructure;
        }
        if body.len() < 1 + TOKEN_LEN {
            return AuthOutcome::BadStructure;
        }
        let presented = &body[1..1 + TOKEN_LEN];
        if presented != self.token.as_bytes() {
            debug!("token mismatch");
            return AuthOutcome::Mismatch;
        }
        AuthOutcome::Authorized {
            payload_offset: 1 + TOKEN_LEN,
        }
    }

    /// Attempts to rotate the session token. Permitted only while
    /// configuring; the proposed token must be exactly 32 characters.
    /// The caller persists the new value on [`Status::Ok`].
    pub fn rotate(&mut self, proposed: &str) -> Status {
        if !self.configuring {
            return Status::NotPermitted;
        }
        if proposed.len() != TOKEN_LEN {
            return Status::Rejected;
        }
        self.token = proposed.to_string();
        info!("session token rotated");
        Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "abcdefghijklmnopqrstuvwxyz012345";

    fn envelope(token: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![token.len() as u8];
        body.extend_from_slice(token.as_bytes());
        body.extend_from_slice(payload);
        body
    }

    #[test]
    fn test_authorize_valid_envelope() {
        let gate = AuthGate::new(TOKEN.to_string(), false);
        let body = envelope(TOKEN, b"payload");
        assert_eq!(
            gate.authorize(&body),
            AuthOutcome::Authorized { payload_offset: 33 }
        );
    }

    #[test]
    fn test_authorize_bad_token_len() {
        let gate = AuthGate::new(TOKEN.to_string(), false);
        let body = envelope("short-token", b"");
        assert_eq!(gate.authorize(&body), AuthOutcome::BadStructure);
    }

    #[test]
    fn test_authorize_truncated_envelope() {
        let gate = AuthGate::new(TOKEN.to_string(), false);
        // Correct length byte, but fewer than 32 token bytes follow.
        let mut body = vec![32u8];
        body.extend_from_slice(b"only-some-bytes");
        assert_eq!(gate.authorize(&body), AuthOutcome::BadStructure);
        assert_eq!(gate.authorize(&[]), AuthOutcome::BadStructure);
    }

    #[test]
    fn test_authorize_mismatch() {
        let gate = AuthGate::new(TOKEN.to_string(), false);
        let body = envelope("ABCDEFGHIJKLMNOPQRSTUVWXYZ543210", b"");
        assert_eq!(gate.authorize(&body), AuthOutcome::Mismatch);
    }

    #[test]
    fn test_rotate_requires_configuring() {
        let mut gate = AuthGate::new(TOKEN.to_string(), false);
        assert_eq!(gate.rotate("ABCDEFGHIJKLMNOPQRSTUVWXYZ543210"), Status::NotPermitted);
        assert_eq!(gate.token(), TOKEN);
    }

    #[test]
    fn test_rotate_rejects_wrong_length() {
        let mut gate = AuthGate::new(TOKEN.to_string(), true);
        // 31 characters
        assert_eq!(gate.rotate("abcdefghijklmnopqrstuvwxyz01234"), Status::Rejected);
        assert_eq!(gate.rotate(""), Status::Rejected);
        assert_eq!(gate.token(), TOKEN);
    }

    #[test]
    fn test_rotate_success() {
        let mut gate = AuthGate::new(TOKEN.to_string(), true);
        let next = "ABCDEFGHIJKLMNOPQRSTUVWXYZ543210";
        assert_eq!(gate.rotate(next), Status::Ok);
        assert_eq!(gate.token(), next);
        // Rotation does not leave configuring mode by itself.
        assert!(gate.is_configuring());
    }

    #[test]
    fn test_enter_configuring_erases_token() {
        let mut gate = AuthGate::new(TOKEN.to_string(), false);
        gate.enter_configuring(true);
        assert!(gate.is_configuring());
        assert_eq!(gate.token(), "");

        gate.exit_configuring();
        assert!(!gate.is_configuring());
    }
}
