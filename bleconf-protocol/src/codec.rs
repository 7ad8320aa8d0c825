//! Byte-level encoder and decode cursor.
//!
//! The encoder appends fixed-width integers (big-endian), length-prefixed
//! strings/buffers, and individual bits into a growable buffer; pushes
//! never fail. The cursor reads the same primitives back from a borrowed
//! slice and never panics: a truncated fixed-width read returns the
//! caller's default silently, while a truncated variable-length read
//! (string/buffer, including a missing length prefix or invalid UTF-8)
//! returns the default *and* raises a sticky error flag. Callers are
//! expected to check the flag after variable-length reads, not after
//! integer reads.

use bytes::{BufMut, BytesMut};

/// Growable output buffer with fluent push primitives.
///
/// All multi-byte integers are written big-endian. Bit pushes accumulate
/// MSB-first into a pending byte that is appended once full or when
/// [`flush_bits`](Encoder::flush_bits) is called.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
    bit_acc: u8,
    bit_count: u8,
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            bit_acc: 0,
            bit_count: 0,
        }
    }

    pub fn push_u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    pub fn push_u16(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16(v);
        self
    }

    /// Writes the low 24 bits of `v`, big-endian.
    pub fn push_u24(&mut self, v: u32) -> &mut Self {
        self.buf.put_u8((v >> 16) as u8);
        self.buf.put_u8((v >> 8) as u8);
        self.buf.put_u8(v as u8);
        self
    }

    pub fn push_u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32(v);
        self
    }

    pub fn push_i8(&mut self, v: i8) -> &mut Self {
        self.push_u8(v as u8)
    }

    pub fn push_i16(&mut self, v: i16) -> &mut Self {
        self.push_u16(v as u16)
    }

    pub fn push_i32(&mut self, v: i32) -> &mut Self {
        self.push_u32(v as u32)
    }

    /// Appends a string with a 1-byte length prefix. Input longer than
    /// 255 bytes is truncated at the limit.
    pub fn push_str8(&mut self, s: &str) -> &mut Self {
        let bytes = s.as_bytes();
        let len = bytes.len().min(u8::MAX as usize);
        self.buf.put_u8(len as u8);
        self.buf.put_slice(&bytes[..len]);
        self
    }

    /// Appends a string with a 2-byte length prefix. Input longer than
    /// 65535 bytes is truncated at the limit.
    pub fn push_str16(&mut self, s: &str) -> &mut Self {
        let bytes = s.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&bytes[..len]);
        self
    }

    /// Appends a byte buffer with a 1-byte length prefix.
    pub fn push_bytes8(&mut self, b: &[u8]) -> &mut Self {
        let len = b.len().min(u8::MAX as usize);
        self.buf.put_u8(len as u8);
        self.buf.put_slice(&b[..len]);
        self
    }

    /// Appends a byte buffer with a 2-byte length prefix.
    pub fn push_bytes16(&mut self, b: &[u8]) -> &mut Self {
        let len = b.len().min(u16::MAX as usize);
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&b[..len]);
        self
    }

    /// Appends raw bytes with no length prefix.
    pub fn push_raw(&mut self, b: &[u8]) -> &mut Self {
        self.buf.put_slice(b);
        self
    }

    /// Accumulates one bit, MSB-first. The pending byte is appended
    /// automatically once 8 bits have been pushed.
    pub fn push_bit(&mut self, bit: bool) -> &mut Self {
        self.bit_acc = (self.bit_acc << 1) | bit as u8;
        self.bit_count += 1;
        if self.bit_count == 8 {
            let byte = self.bit_acc;
            self.bit_acc = 0;
            self.bit_count = 0;
            self.buf.put_u8(byte);
        }
        self
    }

    /// Appends the pending partial byte, left-aligned with zero padding.
    /// No-op when no bits are pending.
    pub fn flush_bits(&mut self) -> &mut Self {
        if self.bit_count > 0 {
            let byte = self.bit_acc << (8 - self.bit_count);
            self.bit_acc = 0;
            self.bit_count = 0;
            self.buf.put_u8(byte);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> BytesMut {
        self.buf
    }
}

/// Read cursor over a borrowed input slice.
///
/// Pops never panic. Fixed-width pops past the end of input return the
/// given default without consuming bytes or raising the error flag;
/// variable-length pops additionally set the flag so callers can reject
/// the whole message instead of acting on defaulted values.
#[derive(Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
    bit_reg: u8,
    bits_left: u8,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
            bit_reg: 0,
            bits_left: 0,
        }
    }

    /// True once any variable-length read has failed.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    pub fn pop_u8(&mut self, default: u8) -> u8 {
        match self.take(1) {
            Some(b) => b[0],
            None => default,
        }
    }

    pub fn pop_u16(&mut self, default: u16) -> u16 {
        match self.take(2) {
            Some(b) => u16::from_be_bytes([b[0], b[1]]),
            None => default,
        }
    }

    pub fn pop_u24(&mut self, default: u32) -> u32 {
        match self.take(3) {
            Some(b) => u32::from_be_bytes([0, b[0], b[1], b[2]]),
            None => default,
        }
    }

    pub fn pop_u32(&mut self, default: u32) -> u32 {
        match self.take(4) {
            Some(b) => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            None => default,
        }
    }

    pub fn pop_i8(&mut self, default: i8) -> i8 {
        self.pop_u8(default as u8) as i8
    }

    pub fn pop_i16(&mut self, default: i16) -> i16 {
        self.pop_u16(default as u16) as i16
    }

    pub fn pop_i32(&mut self, default: i32) -> i32 {
        self.pop_u32(default as u32) as i32
    }

    /// Reads a 1-byte-prefixed string. Raises the error flag on a
    /// missing prefix, a short body, or invalid UTF-8.
    pub fn pop_str8(&mut self, default: &str) -> String {
        let len = match self.take(1) {
            Some(b) => b[0] as usize,
            None => {
                self.failed = true;
                return default.to_owned();
            }
        };
        self.pop_str_body(len, default)
    }

    /// Reads a 2-byte-prefixed string; same failure rules as
    /// [`pop_str8`](Cursor::pop_str8).
    pub fn pop_str16(&mut self, default: &str) -> String {
        let len = match self.take(2) {
            Some(b) => u16::from_be_bytes([b[0], b[1]]) as usize,
            None => {
                self.failed = true;
                return default.to_owned();
            }
        };
        self.pop_str_body(len, default)
    }

    fn pop_str_body(&mut self, len: usize, default: &str) -> String {
        match self.take(len) {
            Some(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => s.to_owned(),
                Err(_) => {
                    self.failed = true;
                    default.to_owned()
                }
            },
            None => {
                self.failed = true;
                default.to_owned()
            }
        }
    }

    /// Reads a 1-byte-prefixed byte buffer.
    pub fn pop_bytes8(&mut self, default: &[u8]) -> Vec<u8> {
        let len = match self.take(1) {
            Some(b) => b[0] as usize,
            None => {
                self.failed = true;
                return default.to_vec();
            }
        };
        self.pop_bytes_body(len, default)
    }

    /// Reads a 2-byte-prefixed byte buffer.
    pub fn pop_bytes16(&mut self, default: &[u8]) -> Vec<u8> {
        let len = match self.take(2) {
            Some(b) => u16::from_be_bytes([b[0], b[1]]) as usize,
            None => {
                self.failed = true;
                return default.to_vec();
            }
        };
        self.pop_bytes_body(len, default)
    }

    fn pop_bytes_body(&mut self, len: usize, default: &[u8]) -> Vec<u8> {
        match self.take(len) {
            Some(bytes) => bytes.to_vec(),
            None => {
                self.failed = true;
                default.to_vec()
            }
        }
    }

    /// Consumes one byte from the input and loads it into the bit
    /// register for subsequent [`pop_bit`](Cursor::pop_bit) calls.
    /// Past the end of input the register is loaded with `default`.
    pub fn prime_bits(&mut self, default: u8) -> &mut Self {
        self.bit_reg = self.pop_u8(default);
        self.bits_left = 8;
        self
    }

    /// Pops the next bit, MSB-first, from the primed register. After 8
    /// bits the register is exhausted and every further call returns
    /// `default` without consuming input until the next
    /// [`prime_bits`](Cursor::prime_bits).
    pub fn pop_bit(&mut self, default: bool) -> bool {
        if self.bits_left == 0 {
            return default;
        }
        self.bits_left -= 1;
        (self.bit_reg >> self.bits_left) & 1 == 1
    }
}
