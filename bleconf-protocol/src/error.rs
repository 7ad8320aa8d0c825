//! Protocol error types.

use thiserror::Error;

/// Errors surfaced by the framing layer.
///
/// All of these are per-frame and transient: the reassembly buffer is
/// reset and the engine keeps accepting bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("CRC mismatch: residual {residual:#06x} over {len} byte frame")]
    CrcMismatch { residual: u16, len: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("declared frame length {declared} shorter than minimum {min}")]
    FrameTooShort { declared: usize, min: usize },
}
