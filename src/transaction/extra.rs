//! # Transaction Extra Fields
//!
//! Codec for the transaction's variable-length tagged extension area.
//!
//! ## Wire Format
//! Each field is a varint tag followed by a tag-specific body:
//! ```text
//! 0x00 padding       (a run of zero bytes)
//! 0x01 public key    (32 bytes)
//! 0x02 nonce         (varint length, then sub-tagged fields)
//! 0x03 merged mining (varint length, then varint depth + 32-byte root)
//! ```
//! Nonce sub-fields: `0x00` payment id (32 bytes) and `0x7f` arbitrary data
//! (varint length + blob).
//!
//! ## Parsing Policy
//! The extra area is the one *tolerant* region of the wire format: it is
//! parsed best-effort so that forward-compatible and adversarial streams
//! never poison the surrounding transaction. Unknown tags, duplicate tags,
//! and locally-undersized known fields are skipped one byte at a time. The
//! single hard stop: a length-delimited field (nonce, merged mining) whose
//! length prefix cannot be read, or whose claimed span overruns the region —
//! past that point the remaining bytes cannot be reliably segmented, so the
//! rest of the region is abandoned. The fields decoded so far are kept and
//! the enclosing transaction parse continues.

use crate::core::cursor::{varint_len, ByteReader, ByteWriter};
use crate::core::hash::{Hash, HASH_SIZE};
use tracing::{debug, trace};

/// Top-level extra field tag: padding.
pub const TAG_PADDING: u64 = 0x00;
/// Top-level extra field tag: transaction public key.
pub const TAG_PUBLIC_KEY: u64 = 0x01;
/// Top-level extra field tag: nonce container.
pub const TAG_NONCE: u64 = 0x02;
/// Top-level extra field tag: merged-mining proof.
pub const TAG_MERGED_MINING: u64 = 0x03;

/// Nonce sub-field tag: payment id.
pub const NONCE_TAG_PAYMENT_ID: u64 = 0x00;
/// Nonce sub-field tag: arbitrary data.
pub const NONCE_TAG_DATA: u64 = 0x7f;

/// One tagged field in the transaction extra area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// A run of zero bytes. `size` counts the zero bytes following the tag.
    Padding { size: u64 },
    /// The transaction's one-time public key.
    PublicKey(Hash),
    /// Container of sub-tagged fields (payment id, arbitrary data).
    Nonce(Vec<NonceField>),
    /// Proof linking the transaction to another chain's merkle root.
    MergedMining { depth: u64, merkle_root: Hash },
}

impl ExtraField {
    /// The field's wire tag.
    pub fn tag(&self) -> u64 {
        match self {
            ExtraField::Padding { .. } => TAG_PADDING,
            ExtraField::PublicKey(_) => TAG_PUBLIC_KEY,
            ExtraField::Nonce(_) => TAG_NONCE,
            ExtraField::MergedMining { .. } => TAG_MERGED_MINING,
        }
    }
}

/// One sub-tagged field inside a [`ExtraField::Nonce`] container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonceField {
    /// 32-byte payment identifier.
    PaymentId(Hash),
    /// Arbitrary-length data blob.
    Data(Vec<u8>),
}

impl NonceField {
    /// The sub-field's wire tag.
    pub fn tag(&self) -> u64 {
        match self {
            NonceField::PaymentId(_) => NONCE_TAG_PAYMENT_ID,
            NonceField::Data(_) => NONCE_TAG_DATA,
        }
    }
}

/// Serializes `fields` in the order given. Callers that build the list via
/// the mutation helpers below always hold it in ascending tag order.
pub fn write_extra(fields: &[ExtraField]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    for field in fields {
        match field {
            ExtraField::Padding { size } => {
                w.write_varint(TAG_PADDING);
                for _ in 0..*size {
                    w.write_u8(0);
                }
            }
            ExtraField::PublicKey(key) => {
                w.write_varint(TAG_PUBLIC_KEY);
                w.write_bytes(key.as_bytes());
            }
            ExtraField::Nonce(subs) => {
                let inner = write_nonce_fields(subs);
                w.write_varint(TAG_NONCE);
                w.write_varint(inner.len() as u64);
                w.write_bytes(&inner);
            }
            ExtraField::MergedMining { depth, merkle_root } => {
                let mut inner = ByteWriter::new();
                inner.write_varint(*depth);
                inner.write_bytes(merkle_root.as_bytes());
                w.write_varint(TAG_MERGED_MINING);
                w.write_varint(inner.len() as u64);
                w.write_bytes(inner.as_slice());
            }
        }
    }
    w.into_vec()
}

fn write_nonce_fields(subs: &[NonceField]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    for sub in subs {
        match sub {
            NonceField::PaymentId(id) => {
                w.write_varint(NONCE_TAG_PAYMENT_ID);
                w.write_bytes(id.as_bytes());
            }
            NonceField::Data(data) => {
                w.write_varint(NONCE_TAG_DATA);
                w.write_varint(data.len() as u64);
                w.write_bytes(data);
            }
        }
    }
    w.into_vec()
}

#[derive(Default)]
struct SeenTags {
    padding: bool,
    public_key: bool,
    nonce: bool,
    merged_mining: bool,
}

/// Single forward pass over the extra region. Never fails; see the module
/// docs for the tolerance policy.
pub fn read_extra(data: &[u8]) -> Vec<ExtraField> {
    let mut fields = Vec::new();
    let mut seen = SeenTags::default();
    let mut r = ByteReader::new(data);

    while !r.is_empty() {
        let tag = match r.peek_varint("extra tag") {
            Ok(tag) => tag,
            Err(_) => {
                // Unreadable tag: best-effort skip, resynchronize a byte later.
                let _ = r.skip(1);
                continue;
            }
        };
        let tag_len = varint_len(tag);

        match tag {
            TAG_PADDING => {
                if !seen.padding {
                    let _ = r.skip(tag_len);
                    fields.push(ExtraField::Padding { size: 0 });
                    seen.padding = true;
                } else {
                    let _ = r.skip(1);
                }
            }
            TAG_PUBLIC_KEY => {
                if !seen.public_key && r.remaining() >= tag_len + HASH_SIZE {
                    let _ = r.skip(tag_len);
                    let key = r
                        .read_array::<HASH_SIZE>("extra public key")
                        .expect("length checked above");
                    fields.push(ExtraField::PublicKey(Hash(key)));
                    seen.public_key = true;
                } else {
                    trace!(tag, "skipping duplicate or undersized public key field");
                    let _ = r.skip(1);
                }
            }
            TAG_NONCE => {
                if seen.nonce {
                    trace!("skipping duplicate nonce field");
                    let _ = r.skip(1);
                    continue;
                }
                let Some(content) = take_length_delimited(&mut r, tag_len) else {
                    debug!("unreadable nonce length; abandoning extra region");
                    break;
                };
                fields.push(ExtraField::Nonce(read_nonce_fields(content)));
                seen.nonce = true;
            }
            TAG_MERGED_MINING => {
                if seen.merged_mining {
                    trace!("skipping duplicate merged-mining field");
                    let _ = r.skip(1);
                    continue;
                }
                let Some(content) = take_length_delimited(&mut r, tag_len) else {
                    debug!("unreadable merged-mining length; abandoning extra region");
                    break;
                };
                let Some(field) = read_merged_mining(content) else {
                    debug!("malformed merged-mining body; abandoning extra region");
                    break;
                };
                fields.push(field);
                seen.merged_mining = true;
            }
            other => {
                trace!(tag = other, "skipping unknown extra tag");
                let _ = r.skip(1);
            }
        }
    }

    fields
}

/// Consumes a `tag + varint length + body` frame from the cursor, returning
/// the body. `None` means the length prefix was unreadable or the claimed
/// span overruns the region — the caller must abandon the region.
fn take_length_delimited<'a>(r: &mut ByteReader<'a>, tag_len: usize) -> Option<&'a [u8]> {
    let mut probe = ByteReader::new(r.rest());
    probe.skip(tag_len).ok()?;
    let inner_len = probe.read_varint("extra field length").ok()?;
    let inner_len = usize::try_from(inner_len).ok()?;
    let total = tag_len + varint_len(inner_len as u64) + inner_len;
    if r.remaining() < total {
        return None;
    }
    r.skip(tag_len + varint_len(inner_len as u64))
        .expect("length checked above");
    Some(
        r.read_bytes(inner_len, "extra field body")
            .expect("length checked above"),
    )
}

fn read_merged_mining(content: &[u8]) -> Option<ExtraField> {
    let mut r = ByteReader::new(content);
    let depth = r.read_varint("merged-mining depth").ok()?;
    let root = r.read_array::<HASH_SIZE>("merged-mining merkle root").ok()?;
    // Surplus bytes inside a well-formed span are ignored.
    Some(ExtraField::MergedMining {
        depth,
        merkle_root: Hash(root),
    })
}

/// Sub-field pass over a nonce body: same seen-once/skip-else policy as the
/// top level, abandoning the sub-parse when a data length is unreadable or
/// overruns the body.
fn read_nonce_fields(content: &[u8]) -> Vec<NonceField> {
    let mut subs = Vec::new();
    let mut seen_payment_id = false;
    let mut seen_data = false;
    let mut r = ByteReader::new(content);

    while !r.is_empty() {
        let tag = match r.peek_varint("nonce sub-tag") {
            Ok(tag) => tag,
            Err(_) => {
                let _ = r.skip(1);
                continue;
            }
        };
        let tag_len = varint_len(tag);

        match tag {
            NONCE_TAG_PAYMENT_ID => {
                if !seen_payment_id && r.remaining() >= tag_len + HASH_SIZE {
                    let _ = r.skip(tag_len);
                    let id = r
                        .read_array::<HASH_SIZE>("payment id")
                        .expect("length checked above");
                    subs.push(NonceField::PaymentId(Hash(id)));
                    seen_payment_id = true;
                } else {
                    let _ = r.skip(1);
                }
            }
            NONCE_TAG_DATA => {
                if seen_data {
                    let _ = r.skip(1);
                    continue;
                }
                let Some(blob) = take_length_delimited(&mut r, tag_len) else {
                    debug!("unreadable nonce data length; abandoning nonce sub-parse");
                    break;
                };
                subs.push(NonceField::Data(blob.to_vec()));
                seen_data = true;
            }
            other => {
                trace!(tag = other, "skipping unknown nonce sub-tag");
                let _ = r.skip(1);
            }
        }
    }

    subs
}

// ---- lookup and mutation helpers over a field list --------------------------

/// First public key in the list, if any.
pub(crate) fn find_public_key(fields: &[ExtraField]) -> Option<Hash> {
    fields.iter().find_map(|f| match f {
        ExtraField::PublicKey(key) => Some(*key),
        _ => None,
    })
}

/// Payment id from the nonce container, if any.
pub(crate) fn find_payment_id(fields: &[ExtraField]) -> Option<Hash> {
    nonce_fields(fields)?.iter().find_map(|s| match s {
        NonceField::PaymentId(id) => Some(*id),
        _ => None,
    })
}

/// Arbitrary data blob from the nonce container, if any.
pub(crate) fn find_extra_data(fields: &[ExtraField]) -> Option<&[u8]> {
    nonce_fields(fields)?.iter().find_map(|s| match s {
        NonceField::Data(data) => Some(data.as_slice()),
        _ => None,
    })
}

/// Merged-mining depth and merkle root, if present.
pub(crate) fn find_merged_mining(fields: &[ExtraField]) -> Option<(u64, Hash)> {
    fields.iter().find_map(|f| match f {
        ExtraField::MergedMining { depth, merkle_root } => Some((*depth, *merkle_root)),
        _ => None,
    })
}

fn nonce_fields(fields: &[ExtraField]) -> Option<&Vec<NonceField>> {
    fields.iter().find_map(|f| match f {
        ExtraField::Nonce(subs) => Some(subs),
        _ => None,
    })
}

/// Replaces any same-tag field with `field` and restores ascending tag order.
pub(crate) fn upsert_field(fields: &mut Vec<ExtraField>, field: ExtraField) {
    fields.retain(|f| f.tag() != field.tag());
    fields.push(field);
    fields.sort_by_key(ExtraField::tag);
}

/// Adds `sub` to the nonce container (creating it if absent), replacing any
/// same-tag sub-field and keeping both lists sorted.
pub(crate) fn upsert_nonce_field(fields: &mut Vec<ExtraField>, sub: NonceField) {
    for field in fields.iter_mut() {
        if let ExtraField::Nonce(subs) = field {
            subs.retain(|s| s.tag() != sub.tag());
            subs.push(sub);
            subs.sort_by_key(NonceField::tag);
            return;
        }
    }
    fields.push(ExtraField::Nonce(vec![sub]));
    fields.sort_by_key(ExtraField::tag);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Hash {
        Hash([byte; HASH_SIZE])
    }

    #[test]
    fn roundtrip_all_field_kinds() {
        let fields = vec![
            ExtraField::PublicKey(key(0x11)),
            ExtraField::Nonce(vec![
                NonceField::PaymentId(key(0x22)),
                NonceField::Data(vec![1, 2, 3, 4]),
            ]),
            ExtraField::MergedMining {
                depth: 300,
                merkle_root: key(0x33),
            },
        ];
        let bytes = write_extra(&fields);
        assert_eq!(read_extra(&bytes), fields);
    }

    #[test]
    fn duplicate_public_key_keeps_first() {
        let first = write_extra(&[ExtraField::PublicKey(key(0xaa))]);
        let second = write_extra(&[ExtraField::PublicKey(key(0xbb))]);
        let mut stream = first;
        stream.extend_from_slice(&second);

        let fields = read_extra(&stream);
        let keys: Vec<_> = fields
            .iter()
            .filter(|f| matches!(f, ExtraField::PublicKey(_)))
            .collect();
        assert_eq!(keys.len(), 1);
        assert_eq!(find_public_key(&fields), Some(key(0xaa)));
    }

    #[test]
    fn unknown_tag_is_skipped_without_error() {
        let mut stream = vec![0x42]; // unknown tag
        stream.extend_from_slice(&write_extra(&[ExtraField::PublicKey(key(0x01))]));
        let fields = read_extra(&stream);
        assert_eq!(find_public_key(&fields), Some(key(0x01)));
    }

    #[test]
    fn undersized_public_key_is_skipped() {
        // Tag 0x01 followed by only 4 bytes: not enough for a key.
        let stream = [0x01, 0xde, 0xad, 0xbe, 0xef];
        let fields = read_extra(&stream);
        assert!(find_public_key(&fields).is_none());
    }

    #[test]
    fn truncated_nonce_length_abandons_region() {
        let mut stream = write_extra(&[ExtraField::PublicKey(key(0x07))]);
        // Nonce tag with a length claiming 200 bytes that are not there.
        stream.extend_from_slice(&[0x02, 0xc8, 0x01]);
        stream.extend_from_slice(&[0u8; 4]);

        let fields = read_extra(&stream);
        // The public key before the bad nonce survives; nothing after it.
        assert_eq!(fields.len(), 1);
        assert_eq!(find_public_key(&fields), Some(key(0x07)));
    }

    #[test]
    fn nonce_tag_with_no_length_byte_abandons_region() {
        let stream = [0x02]; // nonce tag at end of region
        assert!(read_extra(&stream).is_empty());
    }

    #[test]
    fn duplicate_payment_id_keeps_first() {
        let inner = write_nonce_fields(&[
            NonceField::PaymentId(key(0x01)),
            NonceField::PaymentId(key(0x02)),
        ]);
        let mut stream = vec![0x02];
        stream.push(inner.len() as u8);
        stream.extend_from_slice(&inner);

        let fields = read_extra(&stream);
        assert_eq!(find_payment_id(&fields), Some(key(0x01)));
    }

    #[test]
    fn padding_run_collapses_to_single_field() {
        let stream = [0u8; 8];
        let fields = read_extra(&stream);
        assert_eq!(fields, vec![ExtraField::Padding { size: 0 }]);
    }

    #[test]
    fn upsert_field_replaces_and_sorts() {
        let mut fields = vec![
            ExtraField::Nonce(vec![NonceField::Data(vec![9])]),
            ExtraField::PublicKey(key(0x01)),
        ];
        upsert_field(&mut fields, ExtraField::PublicKey(key(0x02)));
        assert_eq!(fields[0], ExtraField::PublicKey(key(0x02)));
        assert_eq!(fields[0].tag(), TAG_PUBLIC_KEY);
        assert_eq!(fields[1].tag(), TAG_NONCE);
    }

    #[test]
    fn upsert_nonce_field_creates_container_and_orders_subs() {
        let mut fields = Vec::new();
        upsert_nonce_field(&mut fields, NonceField::Data(vec![1, 2]));
        upsert_nonce_field(&mut fields, NonceField::PaymentId(key(0x05)));

        let ExtraField::Nonce(subs) = &fields[0] else {
            panic!("expected nonce container");
        };
        assert_eq!(subs[0].tag(), NONCE_TAG_PAYMENT_ID);
        assert_eq!(subs[1].tag(), NONCE_TAG_DATA);

        // Replacing the data sub-field keeps a single instance.
        upsert_nonce_field(&mut fields, NonceField::Data(vec![7]));
        let ExtraField::Nonce(subs) = &fields[0] else {
            panic!("expected nonce container");
        };
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[1], NonceField::Data(vec![7]));
    }
}
