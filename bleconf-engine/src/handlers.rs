//! Command handlers.
//!
//! One function per command in the catalogue. Handlers decode their
//! payload from the cursor, check the cursor's error flag before
//! acting (truncated input answers status 2 rather than acting on
//! defaulted values), perform the work through the collaborator
//! traits, and emit their own response frames.

use crate::dispatch::Dispatcher;
use crate::session::EngineState;
use bleconf_protocol::{
    cmd, Cursor, DeviceInfo, DeviceSetting, FrameBuilder, HubConfig, OtaRequest, RemoteEndpoint,
    Status, WifiCredentials,
};
use tracing::{info, warn};

/// Registers every command handler on the dispatcher.
pub fn register_all(dispatcher: &mut Dispatcher) {
    dispatcher.register(cmd::DEVICE_INFO, Box::new(device_info));
    dispatcher.register(cmd::START_AP_PUSH, Box::new(start_ap_push));
    dispatcher.register(cmd::CONNECT_WIFI, Box::new(connect_wifi));
    dispatcher.register(cmd::REMOTE_ENDPOINT, Box::new(remote_endpoint));
    dispatcher.register(cmd::HUB_CONFIG, Box::new(hub_config));
    dispatcher.register(cmd::OTA_START, Box::new(ota_start));
    dispatcher.register(cmd::DEVICE_SETTING, Box::new(device_setting));
    dispatcher.register(cmd::ROTATE_TOKEN, Box::new(rotate_token));
}

fn reply_status(state: &EngineState, command: u8, status: Status) {
    let frame = FrameBuilder::new(command).push_u8(status.as_u8()).finish();
    state.send_frame(frame);
}

fn device_info(state: &mut EngineState, _cur: &mut Cursor<'_>) -> bool {
    let info = DeviceInfo {
        mac: state.device.mac(),
        board: state.device.board(),
        version: state.device.firmware_version(),
        volume: state.settings.volume,
        mic_enabled: state.settings.mic_enabled,
        dialogue_enabled: state.settings.dialogue_enabled,
        sound_enabled: state.settings.sound_enabled,
        idle_timeout: state.settings.idle_timeout,
        sleep_mode: state.settings.sleep_mode,
        sleep_interval: state.settings.sleep_interval,
    };

    let mut fb = FrameBuilder::new(cmd::DEVICE_INFO).push_u8(Status::Ok.as_u8());
    info.encode(fb.encoder());
    state.send_frame(fb.finish());
    true
}

fn start_ap_push(state: &mut EngineState, _cur: &mut Cursor<'_>) -> bool {
    state.set_ap_push(true);
    reply_status(state, cmd::START_AP_PUSH, Status::Ok);
    true
}

fn connect_wifi(state: &mut EngineState, cur: &mut Cursor<'_>) -> bool {
    // Credentials arriving means the peer picked a network; stop the
    // periodic scan push before attempting to join.
    state.set_ap_push(false);

    let creds = WifiCredentials::decode(cur);
    if cur.failed() {
        reply_status(state, cmd::CONNECT_WIFI, Status::Rejected);
        return false;
    }

    info!(ssid = %creds.ssid, "connecting to wifi");
    if state.wifi.connect(&creds) {
        let frame = FrameBuilder::new(cmd::CONNECT_WIFI)
            .push_u8(Status::Ok.as_u8())
            .push_str8(&state.device.ble_mac())
            .push_str8(&state.device.mac())
            .push_str8(&state.device.board())
            .push_str8(&state.device.firmware_version())
            .finish();
        state.send_frame(frame);
        true
    } else {
        warn!(ssid = %creds.ssid, "wifi connect failed");
        reply_status(state, cmd::CONNECT_WIFI, Status::NotPermitted);
        false
    }
}

fn remote_endpoint(state: &mut EngineState, cur: &mut Cursor<'_>) -> bool {
    let endpoint = RemoteEndpoint::decode(cur);
    if cur.failed() {
        reply_status(state, cmd::REMOTE_ENDPOINT, Status::Rejected);
        return false;
    }

    info!(url = %endpoint.url, "remote endpoint configured");
    state.endpoint = endpoint;
    // Endpoint config finalizes provisioning: leave configuring mode
    // and restart into normal operation once the response drains.
    state.auth.exit_configuring();
    state.persist();
    reply_status(state, cmd::REMOTE_ENDPOINT, Status::Ok);
    state.request_restart();
    true
}

fn hub_config(state: &mut EngineState, cur: &mut Cursor<'_>) -> bool {
    let config = HubConfig::decode(cur);
    if cur.failed() {
        reply_status(state, cmd::HUB_CONFIG, Status::Rejected);
        return false;
    }

    match state.hub.configure(&config) {
        Ok(()) => {
            info!(url = %config.url, "hub configured");
            reply_status(state, cmd::HUB_CONFIG, Status::Ok);
            true
        }
        Err(http_code) => {
            warn!(url = %config.url, http_code, "hub rejected configuration");
            let frame = FrameBuilder::new(cmd::HUB_CONFIG)
                .push_u8(Status::NotPermitted.as_u8())
                .push_i16(http_code)
                .finish();
            state.send_frame(frame);
            false
        }
    }
}

fn ota_start(state: &mut EngineState, cur: &mut Cursor<'_>) -> bool {
    let request = OtaRequest::decode(cur);
    if cur.failed() {
        reply_status(state, cmd::OTA_START, Status::Rejected);
        return false;
    }

    // Ack first; progress frames follow asynchronously from the
    // platform through the engine's notify path.
    reply_status(state, cmd::OTA_START, Status::Ok);
    info!(url = %request.url, version = %request.version, "starting ota");
    state.device.start_ota(&request)
}

fn device_setting(state: &mut EngineState, cur: &mut Cursor<'_>) -> bool {
    let parsed = DeviceSetting::decode(cur);
    let Some(change) = parsed else {
        reply_status(state, cmd::DEVICE_SETTING, Status::Rejected);
        return false;
    };
    if cur.failed() {
        reply_status(state, cmd::DEVICE_SETTING, Status::Rejected);
        return false;
    }

    match &change {
        DeviceSetting::Mic(on) => state.settings.mic_enabled = *on,
        DeviceSetting::Volume(v) => state.settings.volume = *v,
        DeviceSetting::Dialogue(on) => state.settings.dialogue_enabled = *on,
        DeviceSetting::Sound(on) => state.settings.sound_enabled = *on,
        DeviceSetting::IdleTimeout(v) => state.settings.idle_timeout = *v,
        DeviceSetting::SleepMode(v) => state.settings.sleep_mode = *v,
        DeviceSetting::SleepInterval(v) => state.settings.sleep_interval = *v,
        DeviceSetting::DeviceName { id, name } => {
            if let Err(http_code) = state.hub.post_device_name(id, name) {
                warn!(id = %id, http_code, "hub rejected device name");
                reply_status(state, cmd::DEVICE_SETTING, Status::NotPermitted);
                return false;
            }
        }
    }

    info!(subtype = change.subtype(), "device setting applied");
    state.persist();
    reply_status(state, cmd::DEVICE_SETTING, Status::Ok);
    true
}

fn rotate_token(state: &mut EngineState, cur: &mut Cursor<'_>) -> bool {
    let proposed = cur.pop_str8("");
    if cur.failed() {
        reply_status(state, cmd::ROTATE_TOKEN, Status::Rejected);
        return false;
    }

    let status = state.auth.rotate(&proposed);
    if status == Status::Ok {
        state.persist();
    }
    reply_status(state, cmd::ROTATE_TOKEN, status);
    status == Status::Ok
}
