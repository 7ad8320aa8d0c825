//! Typed command payloads.
//!
//! Each type knows how to write itself into an [`Encoder`] and read
//! itself back from a [`Cursor`]. Decoding never fails in-band: fields
//! fall back to defaults and the cursor's error flag records whether
//! the payload was truncated, so callers decide whether to reject.

use crate::codec::{Cursor, Encoder};
use serde::{Deserialize, Serialize};

/// Device identity and current settings, returned by the info command
/// and the successful Wi-Fi connect response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub mac: String,
    pub board: String,
    pub version: String,
    pub volume: u8,
    pub mic_enabled: bool,
    pub dialogue_enabled: bool,
    pub sound_enabled: bool,
    pub idle_timeout: u8,
    pub sleep_mode: u8,
    pub sleep_interval: u32,
}

impl DeviceInfo {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.push_str8(&self.mac)
            .push_str8(&self.board)
            .push_str8(&self.version)
            .push_u8(self.volume)
            .push_u8(self.mic_enabled as u8)
            .push_u8(self.dialogue_enabled as u8)
            .push_u8(self.sound_enabled as u8)
            .push_u8(self.idle_timeout)
            .push_u8(self.sleep_mode)
            .push_u32(self.sleep_interval);
    }

    pub fn decode(cur: &mut Cursor<'_>) -> Self {
        Self {
            mac: cur.pop_str8(""),
            board: cur.pop_str8(""),
            version: cur.pop_str8(""),
            volume: cur.pop_u8(0),
            mic_enabled: cur.pop_u8(0) != 0,
            dialogue_enabled: cur.pop_u8(0) != 0,
            sound_enabled: cur.pop_u8(0) != 0,
            idle_timeout: cur.pop_u8(0),
            sleep_mode: cur.pop_u8(0),
            sleep_interval: cur.pop_u32(0),
        }
    }
}

/// One Wi-Fi scan result in an access-point push frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: String,
    pub rssi: i8,
    pub authmode: u8,
}

impl AccessPoint {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.push_str8(&self.ssid)
            .push_i8(self.rssi)
            .push_u8(self.authmode);
    }

    pub fn decode(cur: &mut Cursor<'_>) -> Self {
        Self {
            ssid: cur.pop_str8(""),
            rssi: cur.pop_i8(0),
            authmode: cur.pop_u8(0),
        }
    }

    /// Writes a push-frame body: a count byte followed by that many
    /// entries.
    pub fn encode_list(list: &[AccessPoint], enc: &mut Encoder) {
        let count = list.len().min(u8::MAX as usize);
        enc.push_u8(count as u8);
        for ap in &list[..count] {
            ap.encode(enc);
        }
    }

    pub fn decode_list(cur: &mut Cursor<'_>) -> Vec<AccessPoint> {
        let count = cur.pop_u8(0);
        (0..count).map(|_| AccessPoint::decode(cur)).collect()
    }
}

/// Wi-Fi connect request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

impl WifiCredentials {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.push_str8(&self.ssid).push_str8(&self.password);
    }

    pub fn decode(cur: &mut Cursor<'_>) -> Self {
        Self {
            ssid: cur.pop_str8(""),
            password: cur.pop_str8(""),
        }
    }
}

/// Remote endpoint configuration: where the device reports once
/// provisioned. The URL uses the 2-byte prefix since endpoint URLs can
/// exceed 255 bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    pub url: String,
    pub token: String,
}

impl RemoteEndpoint {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.push_str16(&self.url).push_str8(&self.token);
    }

    pub fn decode(cur: &mut Cursor<'_>) -> Self {
        Self {
            url: cur.pop_str16(""),
            token: cur.pop_str8(""),
        }
    }
}

/// Third-party hub configuration payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    pub encryption_key: String,
    pub psk: String,
    pub url: String,
    pub api_path: String,
    pub token: String,
    pub mcp_endpoint: String,
    pub device_id: String,
}

impl HubConfig {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.push_str8(&self.encryption_key)
            .push_str8(&self.psk)
            .push_str8(&self.url)
            .push_str8(&self.api_path)
            .push_str8(&self.token)
            .push_str8(&self.mcp_endpoint)
            .push_str8(&self.device_id);
    }

    pub fn decode(cur: &mut Cursor<'_>) -> Self {
        Self {
            encryption_key: cur.pop_str8(""),
            psk: cur.pop_str8(""),
            url: cur.pop_str8(""),
            api_path: cur.pop_str8(""),
            token: cur.pop_str8(""),
            mcp_endpoint: cur.pop_str8(""),
            device_id: cur.pop_str8(""),
        }
    }
}

/// OTA update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaRequest {
    pub url: String,
    pub version: String,
}

impl OtaRequest {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.push_str8(&self.url).push_str8(&self.version);
    }

    pub fn decode(cur: &mut Cursor<'_>) -> Self {
        Self {
            url: cur.pop_str8(""),
            version: cur.pop_str8(""),
        }
    }
}

/// OTA progress notification body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaProgress {
    pub percent: u8,
    pub bytes_read: u16,
}

impl OtaProgress {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.push_u8(self.percent).push_u16(self.bytes_read);
    }

    pub fn decode(cur: &mut Cursor<'_>) -> Self {
        Self {
            percent: cur.pop_u8(0),
            bytes_read: cur.pop_u16(0),
        }
    }
}

/// Subtype bytes for the device-setting command.
pub mod setting {
    pub const MIC: u8 = 0;
    pub const VOLUME: u8 = 1;
    pub const DIALOGUE: u8 = 2;
    pub const SOUND: u8 = 3;
    pub const IDLE_TIMEOUT: u8 = 4;
    pub const SLEEP_MODE: u8 = 5;
    pub const SLEEP_INTERVAL: u8 = 6;
    pub const DEVICE_NAME: u8 = 100;
}

/// One device-setting change, selected by a subtype byte followed by
/// the subtype's value encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSetting {
    Mic(bool),
    Volume(u8),
    Dialogue(bool),
    Sound(bool),
    IdleTimeout(u8),
    SleepMode(u8),
    SleepInterval(u32),
    DeviceName { id: String, name: String },
}

impl DeviceSetting {
    pub fn subtype(&self) -> u8 {
        match self {
            DeviceSetting::Mic(_) => setting::MIC,
            DeviceSetting::Volume(_) => setting::VOLUME,
            DeviceSetting::Dialogue(_) => setting::DIALOGUE,
            DeviceSetting::Sound(_) => setting::SOUND,
            DeviceSetting::IdleTimeout(_) => setting::IDLE_TIMEOUT,
            DeviceSetting::SleepMode(_) => setting::SLEEP_MODE,
            DeviceSetting::SleepInterval(_) => setting::SLEEP_INTERVAL,
            DeviceSetting::DeviceName { .. } => setting::DEVICE_NAME,
        }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.push_u8(self.subtype());
        match self {
            DeviceSetting::Mic(on)
            | DeviceSetting::Dialogue(on)
            | DeviceSetting::Sound(on) => {
                enc.push_u8(*on as u8);
            }
            DeviceSetting::Volume(v) | DeviceSetting::IdleTimeout(v) | DeviceSetting::SleepMode(v) => {
                enc.push_u8(*v);
            }
            DeviceSetting::SleepInterval(v) => {
                enc.push_u32(*v);
            }
            DeviceSetting::DeviceName { id, name } => {
                enc.push_str8(id);
                enc.push_str8(name);
            }
        }
    }

    /// Returns `None` for an unknown subtype byte; the cursor flag
    /// still reports truncation for known subtypes.
    pub fn decode(cur: &mut Cursor<'_>) -> Option<Self> {
        match cur.pop_u8(u8::MAX) {
            setting::MIC => Some(DeviceSetting::Mic(cur.pop_u8(0) != 0)),
            setting::VOLUME => Some(DeviceSetting::Volume(cur.pop_u8(0))),
            setting::DIALOGUE => Some(DeviceSetting::Dialogue(cur.pop_u8(0) != 0)),
            setting::SOUND => Some(DeviceSetting::Sound(cur.pop_u8(0) != 0)),
            setting::IDLE_TIMEOUT => Some(DeviceSetting::IdleTimeout(cur.pop_u8(0))),
            setting::SLEEP_MODE => Some(DeviceSetting::SleepMode(cur.pop_u8(0))),
            setting::SLEEP_INTERVAL => Some(DeviceSetting::SleepInterval(cur.pop_u32(0))),
            setting::DEVICE_NAME => Some(DeviceSetting::DeviceName {
                id: cur.pop_str8(""),
                name: cur.pop_str8(""),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T, E, D>(value: &T, encode: E, decode: D) -> T
    where
        E: Fn(&T, &mut Encoder),
        D: Fn(&mut Cursor<'_>) -> T,
    {
        let mut enc = Encoder::new();
        encode(value, &mut enc);
        let mut cur = Cursor::new(enc.as_slice());
        let out = decode(&mut cur);
        assert!(!cur.failed());
        out
    }

    #[test]
    fn test_device_info_roundtrip() {
        let info = DeviceInfo {
            mac: "aa:bb:cc:dd:ee:ff".into(),
            board: "esp32-s3".into(),
            version: "1.4.2".into(),
            volume: 70,
            mic_enabled: true,
            dialogue_enabled: false,
            sound_enabled: true,
            idle_timeout: 30,
            sleep_mode: 1,
            sleep_interval: 3600,
        };
        let out = roundtrip(&info, DeviceInfo::encode, DeviceInfo::decode);
        assert_eq!(out, info);
    }

    #[test]
    fn test_access_point_list_roundtrip() {
        let list = vec![
            AccessPoint {
                ssid: "home".into(),
                rssi: -42,
                authmode: 3,
            },
            AccessPoint {
                ssid: "guest".into(),
                rssi: -80,
                authmode: 0,
            },
        ];
        let mut enc = Encoder::new();
        AccessPoint::encode_list(&list, &mut enc);
        let mut cur = Cursor::new(enc.as_slice());
        assert_eq!(AccessPoint::decode_list(&mut cur), list);
        assert!(!cur.failed());
    }

    #[test]
    fn test_wifi_credentials_roundtrip() {
        let creds = WifiCredentials {
            ssid: "home".into(),
            password: "secret123".into(),
        };
        let out = roundtrip(&creds, WifiCredentials::encode, WifiCredentials::decode);
        assert_eq!(out, creds);
    }

    #[test]
    fn test_remote_endpoint_long_url() {
        let ep = RemoteEndpoint {
            url: format!("https://example.com/{}", "p".repeat(400)),
            token: "tok".into(),
        };
        let out = roundtrip(&ep, RemoteEndpoint::encode, RemoteEndpoint::decode);
        assert_eq!(out, ep);
    }

    #[test]
    fn test_hub_config_roundtrip() {
        let cfg = HubConfig {
            encryption_key: "key".into(),
            psk: "psk".into(),
            url: "hub.local".into(),
            api_path: "/api/v1".into(),
            token: "tok".into(),
            mcp_endpoint: "mcp.local".into(),
            device_id: "dev-7".into(),
        };
        let out = roundtrip(&cfg, HubConfig::encode, HubConfig::decode);
        assert_eq!(out, cfg);
    }

    #[test]
    fn test_device_setting_roundtrips() {
        let settings = vec![
            DeviceSetting::Mic(true),
            DeviceSetting::Volume(55),
            DeviceSetting::Dialogue(false),
            DeviceSetting::Sound(true),
            DeviceSetting::IdleTimeout(15),
            DeviceSetting::SleepMode(2),
            DeviceSetting::SleepInterval(7200),
            DeviceSetting::DeviceName {
                id: "light.kitchen".into(),
                name: "Kitchen Light".into(),
            },
        ];
        for s in settings {
            let mut enc = Encoder::new();
            s.encode(&mut enc);
            let mut cur = Cursor::new(enc.as_slice());
            assert_eq!(DeviceSetting::decode(&mut cur), Some(s));
            assert!(!cur.failed());
        }
    }

    #[test]
    fn test_device_setting_unknown_subtype() {
        let mut cur = Cursor::new(&[99, 1]);
        assert_eq!(DeviceSetting::decode(&mut cur), None);
    }

    #[test]
    fn test_truncated_payload_flags_cursor() {
        let creds = WifiCredentials {
            ssid: "home".into(),
            password: "secret123".into(),
        };
        let mut enc = Encoder::new();
        creds.encode(&mut enc);
        let data = &enc.as_slice()[..enc.len() - 4];

        let mut cur = Cursor::new(data);
        let _ = WifiCredentials::decode(&mut cur);
        assert!(cur.failed());
    }
}
