//! # bleconf-protocol
//!
//! Wire protocol implementation for the bleconf provisioning channel.
//!
//! This crate provides:
//! - A fluent byte/bit encoder and a non-panicking decode cursor
//! - Length-prefixed framing with CRC16-MODBUS validation
//! - Typed command payloads and protocol constants
//!
//! The protocol runs over an MTU-limited transport (a BLE-style
//! notify/write pair), so frames arrive arbitrarily fragmented and
//! outbound frames are chunked by the engine before sending.

pub mod codec;
pub mod crc;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Cursor, Encoder};
pub use error::ProtocolError;
pub use frame::{FrameAssembler, FrameBuilder, RawFrame, LENGTH_FIELD_SIZE};
pub use message::{
    AccessPoint, DeviceInfo, DeviceSetting, HubConfig, OtaProgress, OtaRequest, RemoteEndpoint,
    WifiCredentials,
};

/// Length of the shared session token, in bytes.
pub const TOKEN_LEN: usize = 32;

/// Per-write size limit of the transport; outbound frames are split
/// into chunks no larger than this.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Upper bound on the reassembly buffer; a declared length that would
/// exceed this resets the buffer.
pub const MAX_FRAME_SIZE: usize = 1024;

/// Command identifiers.
pub mod cmd {
    pub const DEVICE_INFO: u8 = 1;
    pub const START_AP_PUSH: u8 = 2;
    pub const AP_PUSH: u8 = 3;
    pub const CONNECT_WIFI: u8 = 10;
    pub const REMOTE_ENDPOINT: u8 = 12;
    pub const HUB_CONFIG: u8 = 20;
    pub const OTA_START: u8 = 21;
    pub const OTA_PROGRESS: u8 = 22;
    pub const DEVICE_SETTING: u8 = 30;
    pub const PROPERTY_PUSH: u8 = 31;
    pub const ROTATE_TOKEN: u8 = 100;
}

/// Status byte carried in most responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Command succeeded.
    Ok = 0,
    /// Authorization mismatch or operation not permitted.
    NotPermitted = 1,
    /// Structurally invalid input (bad token length, truncated field).
    Rejected = 2,
}

impl Status {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<Status> for u8 {
    fn from(s: Status) -> u8 {
        s as u8
    }
}
