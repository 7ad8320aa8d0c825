//! The protocol engine.
//!
//! One engine serves one provisioning connection. Inbound bytes go
//! through [`Engine::handle_bytes`]; finished response frames come out
//! of the receiver returned by [`Engine::new`] and are drained by
//! [`crate::chunker::pump`]. All session state sits behind a single
//! mutex; handlers run synchronously under it, and the asynchronous
//! paths (chunk pacing, periodic pushes, OTA progress) only touch the
//! outbound channel.

use crate::auth::AuthOutcome;
use crate::config::Config;
use crate::device::{DeviceControl, HubGateway, WifiControl};
use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::handlers;
use crate::session::EngineState;
use crate::store::SettingsStore;
use bleconf_protocol::{
    cmd, AccessPoint, Cursor, DeviceSetting, FrameAssembler, FrameBuilder, OtaProgress, RawFrame,
    Status,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Inner {
    assembler: FrameAssembler,
    state: EngineState,
}

/// Protocol engine for one provisioning connection.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Mutex<Inner>>,
    dispatcher: Arc<Dispatcher>,
    outbound_tx: mpsc::UnboundedSender<Bytes>,
    ap_push_enabled: Arc<AtomicBool>,
    config: Config,
}

impl Engine {
    /// Builds an engine from persisted state and its collaborators.
    /// Returns the engine and the outbound frame receiver the chunk
    /// pump drains.
    pub fn new(
        config: Config,
        store: Arc<dyn SettingsStore>,
        device: Arc<dyn DeviceControl>,
        wifi: Arc<dyn WifiControl>,
        hub: Arc<dyn HubGateway>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Bytes>), EngineError> {
        let persisted = store.load()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let ap_push_enabled = Arc::new(AtomicBool::new(false));

        let state = EngineState::new(
            persisted,
            store,
            device,
            wifi,
            hub,
            outbound_tx.clone(),
            ap_push_enabled.clone(),
        );

        let mut dispatcher = Dispatcher::new();
        handlers::register_all(&mut dispatcher);

        let inner = Inner {
            assembler: FrameAssembler::with_max_size(config.transport.max_frame_size),
            state,
        };

        Ok((
            Self {
                inner: Arc::new(Mutex::new(inner)),
                dispatcher: Arc::new(dispatcher),
                outbound_tx,
                ap_push_enabled,
                config,
            },
            outbound_rx,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Feeds received transport bytes into frame reassembly, running
    /// authorization and dispatch when a frame completes. Corrupt or
    /// oversized frames are dropped without a response.
    pub fn handle_bytes(&self, data: &[u8]) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.assembler.push(data) {
            Ok(Some(frame)) => self.process_frame(&mut inner.state, frame),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "frame rejected"),
        }
    }

    fn process_frame(&self, state: &mut EngineState, frame: RawFrame) {
        debug!(cmd = frame.cmd, len = frame.body.len(), "frame received");

        // Token rotation carries no authorization envelope; the handler
        // applies its own configuring-mode rules.
        if frame.cmd == cmd::ROTATE_TOKEN {
            let mut cursor = Cursor::new(&frame.body);
            self.dispatcher.dispatch(frame.cmd, state, &mut cursor);
            return;
        }

        match state.auth.authorize(&frame.body) {
            AuthOutcome::BadStructure => {
                warn!(cmd = frame.cmd, "malformed authorization envelope");
                self.reply_status(state, frame.cmd, Status::Rejected);
            }
            AuthOutcome::Mismatch => {
                warn!(cmd = frame.cmd, "authorization token mismatch");
                self.reply_status(state, frame.cmd, Status::NotPermitted);
            }
            AuthOutcome::Authorized { payload_offset } => {
                let payload = frame.body.slice(payload_offset..);
                let mut cursor = Cursor::new(&payload);
                self.dispatcher.dispatch(frame.cmd, state, &mut cursor);
            }
        }
    }

    fn reply_status(&self, state: &EngineState, command: u8, status: Status) {
        let frame = FrameBuilder::new(command).push_u8(status.as_u8()).finish();
        state.send_frame(frame);
    }

    /// Marks the start of a provisioning session (the transport calls
    /// this when a peer connects), entering configuring mode.
    pub fn begin_provisioning(&self, erase_token: bool) {
        let mut guard = self.inner.lock();
        guard.state.auth.enter_configuring(erase_token);
        guard.state.persist();
    }

    /// True once a handler has asked the platform to restart.
    pub fn restart_requested(&self) -> bool {
        self.inner.lock().state.restart_requested()
    }

    /// Emits an OTA progress frame. Called by the platform's OTA task;
    /// takes no lock.
    pub fn notify_ota_progress(&self, progress: OtaProgress) {
        let mut fb = FrameBuilder::new(cmd::OTA_PROGRESS);
        progress.encode(fb.encoder());
        let _ = self.outbound_tx.send(fb.finish());
    }

    /// Emits a property-changed push frame for a setting that changed
    /// outside the provisioning channel.
    pub fn notify_property(&self, change: &DeviceSetting) {
        let mut fb = FrameBuilder::new(cmd::PROPERTY_PUSH);
        change.encode(fb.encoder());
        let _ = self.outbound_tx.send(fb.finish());
    }

    /// Builds and queues one access-point push frame from the current
    /// scan snapshot. The scan itself runs outside the session lock.
    pub fn push_access_points(&self) {
        let wifi = self.inner.lock().state.wifi.clone();
        let aps: Vec<AccessPoint> = wifi.scan_results();

        let mut fb = FrameBuilder::new(cmd::AP_PUSH);
        AccessPoint::encode_list(&aps, fb.encoder());
        let _ = self.outbound_tx.send(fb.finish());
    }

    /// Spawns the periodic access-point push task. The task is gated
    /// by the flag the start-push command sets, so it idles cheaply
    /// until a peer asks for scan results.
    pub fn spawn_ap_push_task(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let interval = self.config.push.ap_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if engine.ap_push_enabled.load(Ordering::Relaxed) {
                    engine.push_access_points();
                }
            }
        })
    }
}
