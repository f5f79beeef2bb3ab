//! # Portable Storage
//!
//! The typed key→value binary container ("portable storage") that carries
//! every Levin payload body. Keys are short ASCII names; values are typed
//! scalars, byte strings, nested objects, or homogeneous arrays of byte
//! strings / objects.
//!
//! ## Wire Format
//! ```text
//! [SigA(4 LE)] [SigB(4 LE)] [Version(1)] [root section]
//! section  := count(size-varint) { name_len(1) name type(1) value }*
//! ```
//! Scalars are little-endian fixed width; byte strings are length-prefixed;
//! arrays set the 0x80 flag on the element type and prefix a count.
//!
//! The size-varint here is the container's own encoding — the two low bits
//! of the first byte select a 1/2/4/8-byte little-endian field, and the
//! remaining bits carry the value. It is unrelated to the transaction
//! codec's LEB128 varint.
//!
//! ## Security
//! - Signature and version are validated before anything is interpreted
//! - Nesting depth is bounded (prevents stack exhaustion)
//! - Claimed counts never drive preallocation

use crate::core::cursor::{ByteReader, ByteWriter};
use crate::error::{Result, WireError};

/// First storage signature word.
pub const STORAGE_SIGNATURE_A: u32 = 0x0101_1101;
/// Second storage signature word.
pub const STORAGE_SIGNATURE_B: u32 = 0x0102_0101;
/// Supported storage format version.
pub const STORAGE_VERSION: u8 = 1;

/// Maximum object nesting depth accepted on decode.
const MAX_DEPTH: usize = 32;

const TYPE_INT64: u8 = 1;
const TYPE_INT32: u8 = 2;
const TYPE_INT16: u8 = 3;
const TYPE_INT8: u8 = 4;
const TYPE_UINT64: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_UINT16: u8 = 7;
const TYPE_UINT8: u8 = 8;
const TYPE_DOUBLE: u8 = 9;
const TYPE_STRING: u8 = 10;
const TYPE_BOOL: u8 = 11;
const TYPE_OBJECT: u8 = 12;
const FLAG_ARRAY: u8 = 0x80;

/// A typed value held under a key in a [`PortableStorage`].
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    I64(i64),
    I32(i32),
    I16(i16),
    I8(i8),
    U64(u64),
    U32(u32),
    U16(u16),
    U8(u8),
    Double(f64),
    Bool(bool),
    /// Raw byte string (the container's STRING type carries binary data).
    Bytes(Vec<u8>),
    Object(PortableStorage),
    BytesArray(Vec<Vec<u8>>),
    ObjectArray(Vec<PortableStorage>),
}

/// An ordered typed key→value container with a binary encoding.
///
/// Insertion order is preserved so that encode/decode round-trips are
/// byte-stable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortableStorage {
    entries: Vec<(String, StorageValue)>,
}

impl PortableStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`, replacing any previous entry.
    pub fn set(&mut self, key: &str, value: StorageValue) {
        debug_assert!(!key.is_empty() && key.len() <= u8::MAX as usize);
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| name == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_owned(), value));
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == key)
    }

    pub fn get(&self, key: &str) -> Option<&StorageValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Like [`get`](Self::get), but a missing key is a decode failure.
    pub fn require(&self, key: &'static str) -> Result<&StorageValue> {
        self.get(key).ok_or(WireError::Malformed { context: key })
    }

    /// Reads an unsigned scalar of any width, widened to u64.
    pub fn get_uint(&self, key: &'static str) -> Result<u64> {
        match self.require(key)? {
            StorageValue::U8(v) => Ok(u64::from(*v)),
            StorageValue::U16(v) => Ok(u64::from(*v)),
            StorageValue::U32(v) => Ok(u64::from(*v)),
            StorageValue::U64(v) => Ok(*v),
            _ => Err(WireError::Malformed { context: key }),
        }
    }

    pub fn get_bytes(&self, key: &'static str) -> Result<&[u8]> {
        match self.require(key)? {
            StorageValue::Bytes(v) => Ok(v),
            _ => Err(WireError::Malformed { context: key }),
        }
    }

    pub fn get_object(&self, key: &'static str) -> Result<&PortableStorage> {
        match self.require(key)? {
            StorageValue::Object(v) => Ok(v),
            _ => Err(WireError::Malformed { context: key }),
        }
    }

    pub fn get_bytes_array(&self, key: &'static str) -> Result<&[Vec<u8>]> {
        match self.require(key)? {
            StorageValue::BytesArray(v) => Ok(v),
            _ => Err(WireError::Malformed { context: key }),
        }
    }

    pub fn get_object_array(&self, key: &'static str) -> Result<&[PortableStorage]> {
        match self.require(key)? {
            StorageValue::ObjectArray(v) => Ok(v),
            _ => Err(WireError::Malformed { context: key }),
        }
    }

    /// Serializes the container with the storage header.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(64);
        w.write_u32_le(STORAGE_SIGNATURE_A);
        w.write_u32_le(STORAGE_SIGNATURE_B);
        w.write_u8(STORAGE_VERSION);
        self.write_section(&mut w);
        w.into_vec()
    }

    /// Parses a container from bytes produced by [`encode`](Self::encode).
    ///
    /// The whole input must be consumed; trailing bytes are malformed.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        if r.read_u32_le("storage signature")? != STORAGE_SIGNATURE_A
            || r.read_u32_le("storage signature")? != STORAGE_SIGNATURE_B
        {
            return Err(WireError::malformed("storage signature"));
        }
        let version = r.read_u8("storage version")?;
        if version != STORAGE_VERSION {
            return Err(WireError::unknown("storage version", u64::from(version)));
        }
        let root = Self::read_section(&mut r, 0)?;
        if !r.is_empty() {
            return Err(WireError::malformed("trailing bytes after storage root"));
        }
        Ok(root)
    }

    fn write_section(&self, w: &mut ByteWriter) {
        write_size(w, self.entries.len() as u64);
        for (name, value) in &self.entries {
            w.write_u8(name.len() as u8);
            w.write_bytes(name.as_bytes());
            write_value(w, value);
        }
    }

    fn read_section(r: &mut ByteReader<'_>, depth: usize) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(WireError::malformed("storage nesting too deep"));
        }
        let count = read_size(r, "storage entry count")?;
        let mut section = PortableStorage::new();
        for _ in 0..count {
            let name_len = r.read_u8("storage key length")?;
            if name_len == 0 {
                return Err(WireError::malformed("storage key length"));
            }
            let name_bytes = r.read_bytes(usize::from(name_len), "storage key")?;
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| WireError::malformed("storage key"))?
                .to_owned();
            let value = read_value(r, depth)?;
            section.entries.push((name, value));
        }
        Ok(section)
    }
}

fn write_value(w: &mut ByteWriter, value: &StorageValue) {
    match value {
        StorageValue::I64(v) => {
            w.write_u8(TYPE_INT64);
            w.write_bytes(&v.to_le_bytes());
        }
        StorageValue::I32(v) => {
            w.write_u8(TYPE_INT32);
            w.write_bytes(&v.to_le_bytes());
        }
        StorageValue::I16(v) => {
            w.write_u8(TYPE_INT16);
            w.write_bytes(&v.to_le_bytes());
        }
        StorageValue::I8(v) => {
            w.write_u8(TYPE_INT8);
            w.write_bytes(&v.to_le_bytes());
        }
        StorageValue::U64(v) => {
            w.write_u8(TYPE_UINT64);
            w.write_u64_le(*v);
        }
        StorageValue::U32(v) => {
            w.write_u8(TYPE_UINT32);
            w.write_u32_le(*v);
        }
        StorageValue::U16(v) => {
            w.write_u8(TYPE_UINT16);
            w.write_bytes(&v.to_le_bytes());
        }
        StorageValue::U8(v) => {
            w.write_u8(TYPE_UINT8);
            w.write_u8(*v);
        }
        StorageValue::Double(v) => {
            w.write_u8(TYPE_DOUBLE);
            w.write_bytes(&v.to_le_bytes());
        }
        StorageValue::Bool(v) => {
            w.write_u8(TYPE_BOOL);
            w.write_u8(u8::from(*v));
        }
        StorageValue::Bytes(v) => {
            w.write_u8(TYPE_STRING);
            write_size(w, v.len() as u64);
            w.write_bytes(v);
        }
        StorageValue::Object(v) => {
            w.write_u8(TYPE_OBJECT);
            v.write_section(w);
        }
        StorageValue::BytesArray(items) => {
            w.write_u8(TYPE_STRING | FLAG_ARRAY);
            write_size(w, items.len() as u64);
            for item in items {
                write_size(w, item.len() as u64);
                w.write_bytes(item);
            }
        }
        StorageValue::ObjectArray(items) => {
            w.write_u8(TYPE_OBJECT | FLAG_ARRAY);
            write_size(w, items.len() as u64);
            for item in items {
                item.write_section(w);
            }
        }
    }
}

fn read_value(r: &mut ByteReader<'_>, depth: usize) -> Result<StorageValue> {
    let type_byte = r.read_u8("storage value type")?;
    if type_byte & FLAG_ARRAY != 0 {
        return read_array(r, type_byte & !FLAG_ARRAY, depth);
    }
    match type_byte {
        TYPE_INT64 => Ok(StorageValue::I64(i64::from_le_bytes(
            r.read_array("int64 value")?,
        ))),
        TYPE_INT32 => Ok(StorageValue::I32(r.read_i32_le("int32 value")?)),
        TYPE_INT16 => Ok(StorageValue::I16(i16::from_le_bytes(
            r.read_array("int16 value")?,
        ))),
        TYPE_INT8 => Ok(StorageValue::I8(r.read_u8("int8 value")? as i8)),
        TYPE_UINT64 => Ok(StorageValue::U64(r.read_u64_le("uint64 value")?)),
        TYPE_UINT32 => Ok(StorageValue::U32(r.read_u32_le("uint32 value")?)),
        TYPE_UINT16 => Ok(StorageValue::U16(u16::from_le_bytes(
            r.read_array("uint16 value")?,
        ))),
        TYPE_UINT8 => Ok(StorageValue::U8(r.read_u8("uint8 value")?)),
        TYPE_DOUBLE => Ok(StorageValue::Double(f64::from_le_bytes(
            r.read_array("double value")?,
        ))),
        TYPE_BOOL => Ok(StorageValue::Bool(r.read_u8("bool value")? != 0)),
        TYPE_STRING => {
            let len = read_size(r, "string length")?;
            let len =
                usize::try_from(len).map_err(|_| WireError::malformed("string length"))?;
            let bytes = r.read_bytes(len, "string value")?;
            Ok(StorageValue::Bytes(bytes.to_vec()))
        }
        TYPE_OBJECT => Ok(StorageValue::Object(PortableStorage::read_section(
            r,
            depth + 1,
        )?)),
        other => Err(WireError::unknown("storage value type", u64::from(other))),
    }
}

fn read_array(r: &mut ByteReader<'_>, elem_type: u8, depth: usize) -> Result<StorageValue> {
    let count = read_size(r, "array count")?;
    match elem_type {
        TYPE_STRING => {
            let mut items = Vec::new();
            for _ in 0..count {
                let len = read_size(r, "array string length")?;
                let len = usize::try_from(len)
                    .map_err(|_| WireError::malformed("array string length"))?;
                items.push(r.read_bytes(len, "array string value")?.to_vec());
            }
            Ok(StorageValue::BytesArray(items))
        }
        TYPE_OBJECT => {
            let mut items = Vec::new();
            for _ in 0..count {
                items.push(PortableStorage::read_section(r, depth + 1)?);
            }
            Ok(StorageValue::ObjectArray(items))
        }
        // The protocol payloads only ever carry string and object arrays.
        other => Err(WireError::unknown(
            "storage array element type",
            u64::from(other),
        )),
    }
}

/// Writes the container's size-marker varint (2-bit width selector).
fn write_size(w: &mut ByteWriter, value: u64) {
    if value < (1 << 6) {
        w.write_u8((value as u8) << 2);
    } else if value < (1 << 14) {
        w.write_bytes(&(((value as u16) << 2) | 1).to_le_bytes());
    } else if value < (1 << 30) {
        w.write_u32_le(((value as u32) << 2) | 2);
    } else {
        debug_assert!(value < (1 << 62));
        w.write_u64_le((value << 2) | 3);
    }
}

/// Reads the container's size-marker varint.
fn read_size(r: &mut ByteReader<'_>, context: &'static str) -> Result<u64> {
    let first = r.read_u8(context)?;
    let marker = first & 0x03;
    match marker {
        0 => Ok(u64::from(first >> 2)),
        1 => {
            let second = r.read_u8(context)?;
            Ok(u64::from(u16::from_le_bytes([first, second]) >> 2))
        }
        2 => {
            let rest: [u8; 3] = r.read_array(context)?;
            let word = u32::from_le_bytes([first, rest[0], rest[1], rest[2]]);
            Ok(u64::from(word >> 2))
        }
        _ => {
            let rest: [u8; 7] = r.read_array(context)?;
            let word = u64::from_le_bytes([
                first, rest[0], rest[1], rest[2], rest[3], rest[4], rest[5], rest[6],
            ]);
            Ok(word >> 2)
        }
    }
}
