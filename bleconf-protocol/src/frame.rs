//! Length-prefixed framing with CRC16 integrity.
//!
//! Frame layout:
//!
//! ```text
//! +----------+--------+----------------------+----------+
//! | length   | cmd    | body                 | crc16    |
//! | u16 BE   | u8     | length - 3 bytes     | 2 bytes  |
//! +----------+--------+----------------------+----------+
//! ```
//!
//! `length` counts everything after itself, CRC included, so a frame is
//! complete once `length + 2` bytes are buffered. The CRC is the
//! CRC16-MODBUS checksum over `cmd + body`, appended little-endian, so
//! recomputing over `cmd..=crc` yields zero on an intact frame.
//!
//! For every command except token rotation the body begins with an
//! authorization envelope `[token_len:u8][token:32 bytes]`; that check
//! belongs to the engine, not this layer, which only guarantees the
//! frame arrived whole and uncorrupted.

use crate::codec::Encoder;
use crate::crc;
use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Bytes, BytesMut};
use tracing::warn;

/// Size of the leading length field.
pub const LENGTH_FIELD_SIZE: usize = 2;

/// Smallest valid declared length: cmd byte plus the 2-byte CRC.
const MIN_DECLARED_LEN: usize = 3;

/// A validated inbound frame: command id plus the body between the
/// command byte and the CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub cmd: u8,
    pub body: Bytes,
}

/// Builds an outbound frame, patching length and CRC on finish.
#[derive(Debug)]
pub struct FrameBuilder {
    enc: Encoder,
}

impl FrameBuilder {
    /// Starts a frame for `cmd`, reserving the length header.
    pub fn new(cmd: u8) -> Self {
        let mut enc = Encoder::with_capacity(64);
        enc.push_u16(0).push_u8(cmd);
        Self { enc }
    }

    pub fn push_u8(mut self, v: u8) -> Self {
        self.enc.push_u8(v);
        self
    }

    pub fn push_u16(mut self, v: u16) -> Self {
        self.enc.push_u16(v);
        self
    }

    pub fn push_u32(mut self, v: u32) -> Self {
        self.enc.push_u32(v);
        self
    }

    pub fn push_i8(mut self, v: i8) -> Self {
        self.enc.push_i8(v);
        self
    }

    pub fn push_i16(mut self, v: i16) -> Self {
        self.enc.push_i16(v);
        self
    }

    pub fn push_str8(mut self, s: &str) -> Self {
        self.enc.push_str8(s);
        self
    }

    pub fn push_str16(mut self, s: &str) -> Self {
        self.enc.push_str16(s);
        self
    }

    pub fn push_raw(mut self, b: &[u8]) -> Self {
        self.enc.push_raw(b);
        self
    }

    /// Appends the authorization envelope (`token_len` byte followed by
    /// the raw token bytes) used by every request except rotation.
    pub fn push_token(mut self, token: &str) -> Self {
        self.enc.push_u8(token.len() as u8).push_raw(token.as_bytes());
        self
    }

    /// Gives handler code direct access to the underlying encoder.
    pub fn encoder(&mut self) -> &mut Encoder {
        &mut self.enc
    }

    /// Appends the CRC and patches the length header, returning the
    /// finished wire bytes.
    pub fn finish(self) -> Bytes {
        let mut buf = self.enc.into_bytes();
        let sum = crc::checksum(&buf[LENGTH_FIELD_SIZE..]);
        buf.extend_from_slice(&sum.to_le_bytes());
        let declared = (buf.len() - LENGTH_FIELD_SIZE) as u16;
        buf[0..2].copy_from_slice(&declared.to_be_bytes());
        buf.freeze()
    }
}

/// Accumulates transport bytes and surfaces complete, CRC-valid frames.
///
/// The buffer persists across fragmented deliveries and is cleared
/// unconditionally after any complete-frame outcome, valid or not, so
/// at most one logical frame is processed per reassembly cycle.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    max_size: usize,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_max_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(128),
            max_size,
        }
    }

    /// Appends transport bytes and attempts to complete a frame.
    ///
    /// Returns `Ok(None)` while the frame is still incomplete,
    /// `Ok(Some(frame))` once a valid frame is assembled, and `Err` for
    /// a corrupt or oversized frame (the buffer is reset in all
    /// terminal cases).
    pub fn push(&mut self, data: &[u8]) -> Result<Option<RawFrame>, ProtocolError> {
        self.buf.extend_from_slice(data);

        if self.buf.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        let declared = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
        if declared + LENGTH_FIELD_SIZE > self.max_size {
            let size = declared + LENGTH_FIELD_SIZE;
            self.buf.clear();
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_size,
            });
        }
        if declared < MIN_DECLARED_LEN {
            self.buf.clear();
            return Err(ProtocolError::FrameTooShort {
                declared,
                min: MIN_DECLARED_LEN,
            });
        }
        if declared + LENGTH_FIELD_SIZE > self.buf.len() {
            return Ok(None);
        }

        let span = &self.buf[LENGTH_FIELD_SIZE..LENGTH_FIELD_SIZE + declared];
        let residual = crc::checksum(span);
        if residual != 0 {
            warn!(residual = format!("{residual:#06x}"), len = declared, "dropping corrupt frame");
            self.buf.clear();
            return Err(ProtocolError::CrcMismatch {
                residual,
                len: declared,
            });
        }

        let cmd = span[0];
        let body = Bytes::copy_from_slice(&span[1..declared - 2]);
        self.buf.clear();
        Ok(Some(RawFrame { cmd, body }))
    }

    /// Bytes currently awaiting a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Discards any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Bytes {
        FrameBuilder::new(10)
            .push_token("abcdefghijklmnopqrstuvwxyz012345")
            .push_str8("home")
            .push_str8("secret123")
            .finish()
    }

    #[test]
    fn test_builder_layout() {
        let frame = FrameBuilder::new(1).push_u8(0).finish();
        // length(2) + cmd(1) + status(1) + crc(2)
        assert_eq!(frame.len(), 6);
        let declared = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(declared, frame.len() - 2);
        assert_eq!(frame[2], 1);
        // CRC-inclusive residual over cmd..=crc is zero.
        assert!(crc::residual_ok(&frame[2..]));
    }

    #[test]
    fn test_roundtrip_whole_delivery() {
        let frame = sample_frame();
        let mut asm = FrameAssembler::new();
        let raw = asm.push(&frame).unwrap().unwrap();
        assert_eq!(raw.cmd, 10);
        // token envelope + two strings, no CRC in the body
        assert_eq!(raw.body.len(), 1 + 32 + 5 + 10);
        assert_eq!(asm.buffered(), 0);
    }

    #[test]
    fn test_fragmented_delivery_one_byte() {
        let frame = sample_frame();
        let mut asm = FrameAssembler::new();
        let mut result = None;
        for byte in frame.iter() {
            if let Some(raw) = asm.push(std::slice::from_ref(byte)).unwrap() {
                result = Some(raw);
            }
        }
        let raw = result.expect("frame should complete");
        assert_eq!(raw.cmd, 10);
    }

    #[test]
    fn test_fragmented_delivery_seven_bytes() {
        let frame = sample_frame();
        let mut asm = FrameAssembler::new();

        let whole = {
            let mut a = FrameAssembler::new();
            a.push(&frame).unwrap().unwrap()
        };

        let mut result = None;
        for chunk in frame.chunks(7) {
            if let Some(raw) = asm.push(chunk).unwrap() {
                result = Some(raw);
            }
        }
        assert_eq!(result.unwrap(), whole);
    }

    #[test]
    fn test_crc_mismatch_resets_buffer() {
        let frame = sample_frame();
        let mut corrupt = frame.to_vec();
        corrupt[5] ^= 0x01;

        let mut asm = FrameAssembler::new();
        let err = asm.push(&corrupt).unwrap_err();
        assert!(matches!(err, ProtocolError::CrcMismatch { .. }));
        assert_eq!(asm.buffered(), 0);

        // A good frame right after is still accepted.
        assert!(asm.push(&frame).unwrap().is_some());
    }

    #[test]
    fn test_oversized_length_resets() {
        let mut asm = FrameAssembler::with_max_size(64);
        let err = asm.push(&[0xFF, 0xFF, 0x01]).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
        assert_eq!(asm.buffered(), 0);

        let frame = FrameBuilder::new(1).push_u8(0).finish();
        assert!(asm.push(&frame).unwrap().is_some());
    }

    #[test]
    fn test_undersized_length_rejected() {
        let mut asm = FrameAssembler::new();
        let err = asm.push(&[0x00, 0x02]).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooShort { .. }));
    }

    #[test]
    fn test_incomplete_frame_waits() {
        let frame = sample_frame();
        let mut asm = FrameAssembler::new();
        assert!(asm.push(&frame[..frame.len() - 1]).unwrap().is_none());
        assert_eq!(asm.buffered(), frame.len() - 1);
        assert!(asm.push(&frame[frame.len() - 1..]).unwrap().is_some());
    }

    #[test]
    fn test_trailing_bytes_discarded_with_frame() {
        // Two frames in one burst: the second is dropped with the
        // buffer, one logical frame per cycle.
        let first = FrameBuilder::new(1).push_u8(0).finish();
        let second = sample_frame();
        let mut burst = first.to_vec();
        burst.extend_from_slice(&second);

        let mut asm = FrameAssembler::new();
        let raw = asm.push(&burst).unwrap().unwrap();
        assert_eq!(raw.cmd, 1);
        assert_eq!(asm.buffered(), 0);
    }

    #[test]
    fn test_rotation_frame_has_no_envelope() {
        let frame = FrameBuilder::new(crate::cmd::ROTATE_TOKEN)
            .push_str8("ABCDEFGHIJKLMNOPQRSTUVWXYZ012345")
            .finish();
        let mut asm = FrameAssembler::new();
        let raw = asm.push(&frame).unwrap().unwrap();
        assert_eq!(raw.cmd, 100);
        assert_eq!(raw.body.len(), 33);
    }
}
