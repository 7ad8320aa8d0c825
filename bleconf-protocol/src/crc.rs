//! Frame integrity checksum.
//!
//! CRC16-MODBUS (polynomial 0x8005 bit-reflected, initial register
//! 0xFFFF, no output xor). The checksum is appended to a frame as its
//! little-endian bytes, so recomputing over the protected span with the
//! CRC included yields exactly zero on an intact frame.

use crc::{Crc, CRC_16_MODBUS};

pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Computes the checksum over `data`.
pub fn checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Returns true when `data` ends in its own valid checksum, i.e. the
/// CRC-inclusive residual is zero.
pub fn residual_ok(data: &[u8]) -> bool {
    CRC16.checksum(data) == 0
}
