//! # Byte Cursors
//!
//! Sequential, bounds-checked readers and writers over in-memory byte
//! buffers. Every wire structure in this crate is built on these two types.
//!
//! ## Components
//! - **ByteReader**: positional reads of fixed-width integers (little and
//!   big endian), fixed byte runs, and variable-length integers, with
//!   non-consuming peeks and explicit remaining-length tracking
//! - **ByteWriter**: the mirrored append-only writer on top of [`BytesMut`]
//!
//! ## Varints
//! The variable-length integer here is the transaction-format varint: seven
//! value bits per byte, least-significant group first, high bit as the
//! continuation flag. The portable-storage container uses a different
//! size-marker varint, which lives in [`crate::core::storage`].
//!
//! All reads fail with [`WireError::Truncated`] rather than panicking;
//! nothing in this module allocates based on attacker-claimed lengths.

use crate::error::{Result, WireError};
use bytes::{BufMut, BytesMut};

/// Maximum encoded size of a 64-bit varint.
const MAX_VARINT64_LEN: u32 = 10;
/// Maximum encoded size of a 128-bit varint.
const MAX_VARINT128_LEN: u32 = 19;

/// A bounds-checked forward reader over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread tail of the input.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Advances past `n` bytes without interpreting them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(WireError::truncated("skipped bytes", n - self.remaining()));
        }
        self.pos += n;
        Ok(())
    }

    /// Reads exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(WireError::truncated(context, n - self.remaining()));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Reads a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.read_array::<1>(context)?[0])
    }

    pub fn read_u32_le(&mut self, context: &'static str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_i32_le(&mut self, context: &'static str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_u64_le(&mut self, context: &'static str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_u64_be(&mut self, context: &'static str) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array(context)?))
    }

    /// Reads a varint that must fit in 64 bits.
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64> {
        let (value, len) = decode_varint(self.rest(), MAX_VARINT64_LEN, context)?;
        self.pos += len;
        value
            .try_into()
            .map_err(|_| WireError::malformed(context))
    }

    /// Reads a varint that may occupy the full 128-bit range.
    pub fn read_varint_u128(&mut self, context: &'static str) -> Result<u128> {
        let (value, len) = decode_varint(self.rest(), MAX_VARINT128_LEN, context)?;
        self.pos += len;
        Ok(value)
    }

    /// Decodes the varint at the cursor without consuming it.
    pub fn peek_varint(&self, context: &'static str) -> Result<u64> {
        let (value, _) = decode_varint(self.rest(), MAX_VARINT64_LEN, context)?;
        value
            .try_into()
            .map_err(|_| WireError::malformed(context))
    }
}

/// Decodes one varint from the head of `input`, returning the value and the
/// number of bytes it occupied.
fn decode_varint(input: &[u8], max_len: u32, context: &'static str) -> Result<(u128, usize)> {
    let mut value: u128 = 0;
    for (i, &byte) in input.iter().enumerate() {
        if i as u32 >= max_len {
            return Err(WireError::malformed(context));
        }
        let shift = 7 * i as u32;
        let group = u128::from(byte & 0x7f);
        // A continuation group that would shift past the width is overlong.
        if shift > 0 && group.checked_shl(shift).map_or(true, |v| v >> shift != group) {
            return Err(WireError::malformed(context));
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(WireError::truncated(context, 1))
}

/// Number of bytes `value` occupies as a varint.
pub fn varint_len(value: u64) -> usize {
    varint_len_u128(u128::from(value))
}

/// Number of bytes `value` occupies as a varint, 128-bit width.
pub fn varint_len_u128(mut value: u128) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// An append-only writer mirroring [`ByteReader`].
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_i32_le(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn write_u64_le(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn write_u64_be(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn write_varint(&mut self, value: u64) {
        self.write_varint_u128(u128::from(value));
    }

    pub fn write_varint_u128(&mut self, mut value: u128) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    /// Consumes the writer, yielding the written bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.freeze().to_vec()
    }

    /// Borrows the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
