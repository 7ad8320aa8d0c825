//! Simulated device collaborators.
//!
//! The agent stands in for real hardware: Wi-Fi joins succeed for any
//! plausible password, scans return a canned neighborhood, and hub
//! calls are logged instead of sent. This is enough to exercise the
//! whole protocol path from a real client.

use bleconf_engine::{hash_authorization, random_salt, DeviceControl, HubGateway, WifiControl};
use bleconf_protocol::{AccessPoint, HubConfig, OtaRequest, WifiCredentials};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub struct SimDevice {
    ota_tx: mpsc::UnboundedSender<OtaRequest>,
    restart_requested: AtomicBool,
}

impl SimDevice {
    /// Returns the device and the receiver the OTA progress task
    /// drains.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OtaRequest>) {
        let (ota_tx, ota_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                ota_tx,
                restart_requested: AtomicBool::new(false),
            }),
            ota_rx,
        )
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::Relaxed)
    }
}

impl DeviceControl for SimDevice {
    fn mac(&self) -> String {
        "aa:bb:cc:dd:ee:ff".to_string()
    }

    fn ble_mac(&self) -> String {
        "aa:bb:cc:dd:ee:00".to_string()
    }

    fn board(&self) -> String {
        "sim-board".to_string()
    }

    fn firmware_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn request_restart(&self) {
        info!("restart requested (simulated)");
        self.restart_requested.store(true, Ordering::Relaxed);
    }

    fn start_ota(&self, request: &OtaRequest) -> bool {
        self.ota_tx.send(request.clone()).is_ok()
    }
}

pub struct SimWifi;

impl WifiControl for SimWifi {
    fn connect(&self, credentials: &WifiCredentials) -> bool {
        // WPA2 minimum; anything shorter fails like a bad password.
        let ok = !credentials.ssid.is_empty() && credentials.password.len() >= 8;
        info!(ssid = %credentials.ssid, ok, "simulated wifi join");
        ok
    }

    fn scan_results(&self) -> Vec<AccessPoint> {
        vec![
            AccessPoint {
                ssid: "home".into(),
                rssi: -38,
                authmode: 3,
            },
            AccessPoint {
                ssid: "home-guest".into(),
                rssi: -52,
                authmode: 3,
            },
            AccessPoint {
                ssid: "cafe-open".into(),
                rssi: -81,
                authmode: 0,
            },
        ]
    }
}

pub struct SimHub;

impl HubGateway for SimHub {
    fn configure(&self, config: &HubConfig) -> Result<(), i16> {
        // Sign the registration the way the real gateway would, so the
        // whole request path is exercised.
        let salt = random_salt();
        let signature = hash_authorization(
            &config.url,
            &[("device_id", &config.device_id), ("salt", &salt)],
            "aa:bb:cc:dd:ee:ff",
            &config.psk,
        );
        info!(url = %config.url, device_id = %config.device_id, %signature, "simulated hub registration");
        Ok(())
    }

    fn post_device_name(&self, id: &str, name: &str) -> Result<(), i16> {
        info!(id, name, "simulated hub device rename");
        Ok(())
    }
}
