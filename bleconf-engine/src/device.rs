//! Collaborator interfaces.
//!
//! The engine never talks to the radio, the Wi-Fi stack, or the hub
//! directly; it goes through these narrow traits so it can be driven
//! end to end in tests without hardware.

use bleconf_protocol::{AccessPoint, HubConfig, OtaRequest, WifiCredentials};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Identity and lifecycle control of the device itself.
pub trait DeviceControl: Send + Sync {
    /// Station MAC address, formatted for display.
    fn mac(&self) -> String;
    /// MAC of the provisioning radio.
    fn ble_mac(&self) -> String;
    fn board(&self) -> String;
    fn firmware_version(&self) -> String;
    /// Asks the platform to restart once the current work settles.
    fn request_restart(&self);
    /// Kicks off an OTA download; progress is reported back through
    /// the engine's notify path. Returns false when the update cannot
    /// start.
    fn start_ota(&self, request: &OtaRequest) -> bool;
}

/// Wi-Fi association and scanning.
pub trait WifiControl: Send + Sync {
    /// Attempts to join the network. Blocking; the engine calls this
    /// from a dispatch context that already owns the session lock.
    fn connect(&self, credentials: &WifiCredentials) -> bool;
    /// Latest scan snapshot for the periodic access-point push.
    fn scan_results(&self) -> Vec<AccessPoint>;
}

/// Third-party hub registration.
///
/// Failures carry the HTTP status code the hub answered with, which is
/// forwarded to the provisioning peer.
pub trait HubGateway: Send + Sync {
    fn configure(&self, config: &HubConfig) -> Result<(), i16>;
    fn post_device_name(&self, id: &str, name: &str) -> Result<(), i16>;
}

/// Builds the request signature hub calls carry: SHA-256 over the URL,
/// the parameters in sorted order, the device MAC, and a caller-chosen
/// salt, hex-encoded.
pub fn hash_authorization(url: &str, params: &[(&str, &str)], mac: &str, salt: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    for (key, value) in sorted {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hasher.update(mac.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a random lowercase-hex salt for request signing.
pub fn random_salt() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_order_independent() {
        let a = hash_authorization(
            "https://hub.local/api",
            &[("b", "2"), ("a", "1")],
            "aa:bb",
            "salt",
        );
        let b = hash_authorization(
            "https://hub.local/api",
            &[("a", "1"), ("b", "2")],
            "aa:bb",
            "salt",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_varies_with_salt() {
        let a = hash_authorization("u", &[], "mac", "one");
        let b = hash_authorization("u", &[], "mac", "two");
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_salt_shape() {
        let salt = random_salt();
        assert_eq!(salt.len(), 16);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signing_helpers_exported_at_crate_root() {
        // Callers outside the crate import these from the root.
        let salt = crate::random_salt();
        let sig = crate::hash_authorization("u", &[], "mac", &salt);
        assert_eq!(sig.len(), 64);
    }
}
