//! Mutable engine session state.
//!
//! Everything a command handler may touch lives here, so handlers take
//! `&mut EngineState` and the engine serializes access with one lock.

use crate::auth::AuthGate;
use crate::device::{DeviceControl, HubGateway, WifiControl};
use crate::store::{DeviceSettings, PersistedState, SettingsStore};
use bleconf_protocol::RemoteEndpoint;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

pub struct EngineState {
    pub auth: AuthGate,
    pub settings: DeviceSettings,
    pub endpoint: RemoteEndpoint,
    pub device: Arc<dyn DeviceControl>,
    pub wifi: Arc<dyn WifiControl>,
    pub hub: Arc<dyn HubGateway>,
    store: Arc<dyn SettingsStore>,
    outbound: mpsc::UnboundedSender<Bytes>,
    ap_push_enabled: Arc<AtomicBool>,
    restart_requested: bool,
}

impl EngineState {
    pub(crate) fn new(
        persisted: PersistedState,
        store: Arc<dyn SettingsStore>,
        device: Arc<dyn DeviceControl>,
        wifi: Arc<dyn WifiControl>,
        hub: Arc<dyn HubGateway>,
        outbound: mpsc::UnboundedSender<Bytes>,
        ap_push_enabled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            auth: AuthGate::new(persisted.token, persisted.configuring),
            settings: persisted.settings,
            endpoint: RemoteEndpoint {
                url: persisted.endpoint_url,
                token: persisted.endpoint_token,
            },
            device,
            wifi,
            hub,
            store,
            outbound,
            ap_push_enabled,
            restart_requested: false,
        }
    }

    /// Queues a finished frame for chunked delivery. Send failures mean
    /// the transport side is gone; the frame is dropped.
    pub fn send_frame(&self, frame: Bytes) {
        let _ = self.outbound.send(frame);
    }

    /// Writes the current persistent state through the settings store.
    /// Store failures are logged, not propagated: the in-memory state
    /// is already updated and the peer has been answered.
    pub fn persist(&self) {
        let state = PersistedState {
            token: self.auth.token().to_string(),
            configuring: self.auth.is_configuring(),
            endpoint_url: self.endpoint.url.clone(),
            endpoint_token: self.endpoint.token.clone(),
            settings: self.settings.clone(),
        };
        if let Err(e) = self.store.save(&state) {
            error!(error = %e, "failed to persist settings");
        }
    }

    /// Enables or disables the periodic access-point push.
    pub fn set_ap_push(&self, enabled: bool) {
        self.ap_push_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Marks that the platform should restart once the response has
    /// drained.
    pub fn request_restart(&mut self) {
        self.restart_requested = true;
        self.device.request_restart();
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }
}
