//! # Transaction Codec
//!
//! Serialization, parsing, and hashing of CryptoNote transactions.
//!
//! ## Wire Format
//! ```text
//! version(varint) unlock_time(varint)
//! input_count(varint)  { 0xff block_index(varint)
//!                      | 0x02 amount(varint) offset_count(varint) offsets(varint*) key_image(32) }*
//! output_count(varint) { amount(varint) 0x02 key(32) }*
//! extra_len(varint) extra_bytes
//! [ signatures: 64 bytes per key offset, grouped per key input ]
//! ```
//!
//! ## Two Types
//! [`Transaction`] is immutable: it is what [`Transaction::decode`] produces
//! from wire bytes (preserving the raw extra region verbatim for byte-exact
//! re-encoding) and what [`TransactionBuilder::build`] finalizes. All
//! mutation happens on [`TransactionBuilder`], so "read-only after parse" is
//! a property of the type system here, not a runtime flag.
//!
//! ## Hashing
//! The published hash is Keccak-256 of the encoded bytes; from version 2 the
//! first-pass hash is re-hashed with a fixed 65-byte suffix appended. The
//! prefix hash applies the same rule to the header-only encoding (the form
//! that gets signed). Both are cached lazily; builder mutators drop the
//! caches.

pub mod extra;

use crate::core::cursor::{ByteReader, ByteWriter};
use crate::core::hash::{content_hash, Hash, Signature, HASH_SIZE, SIGNATURE_SIZE};
use crate::error::{Result, WireError};
use self::extra::{ExtraField, NonceField};
use std::sync::OnceLock;
use tracing::trace;

/// Wire type selector for a coinbase (miner reward) input.
pub const INPUT_TAG_COINBASE: u8 = 0xff;
/// Wire type selector for a key input.
pub const INPUT_TAG_KEY: u8 = 0x02;
/// Wire type selector for a key output (the only defined output type).
pub const OUTPUT_TAG_KEY: u8 = 0x02;

/// One transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionInput {
    /// Miner reward input: carries only the block height, never signed.
    Coinbase { block_index: u64 },
    /// Spend of previous outputs selected by relative key offsets.
    Key {
        amount: u64,
        key_offsets: Vec<u64>,
        key_image: Hash,
    },
}

impl TransactionInput {
    pub fn is_coinbase(&self) -> bool {
        matches!(self, TransactionInput::Coinbase { .. })
    }

    fn write(&self, w: &mut ByteWriter) {
        match self {
            TransactionInput::Coinbase { block_index } => {
                w.write_u8(INPUT_TAG_COINBASE);
                w.write_varint(*block_index);
            }
            TransactionInput::Key {
                amount,
                key_offsets,
                key_image,
            } => {
                w.write_u8(INPUT_TAG_KEY);
                w.write_varint(*amount);
                w.write_varint(key_offsets.len() as u64);
                for offset in key_offsets {
                    w.write_varint(*offset);
                }
                w.write_bytes(key_image.as_bytes());
            }
        }
    }

    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let tag = r.read_u8("input type")?;
        match tag {
            INPUT_TAG_COINBASE => Ok(TransactionInput::Coinbase {
                block_index: r.read_varint("coinbase block index")?,
            }),
            INPUT_TAG_KEY => {
                let amount = r.read_varint("input amount")?;
                let offset_count = r.read_varint("key offset count")?;
                let mut key_offsets = Vec::new();
                for _ in 0..offset_count {
                    key_offsets.push(r.read_varint("key offset")?);
                }
                let key_image = Hash(r.read_array::<HASH_SIZE>("key image")?);
                Ok(TransactionInput::Key {
                    amount,
                    key_offsets,
                    key_image,
                })
            }
            other => Err(WireError::unknown("transaction input type", u64::from(other))),
        }
    }
}

/// One transaction output. Only the key-output type exists on the wire; any
/// other selector byte fails the decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutput {
    Key { amount: u64, key: Hash },
}

impl TransactionOutput {
    pub fn amount(&self) -> u64 {
        match self {
            TransactionOutput::Key { amount, .. } => *amount,
        }
    }

    fn write(&self, w: &mut ByteWriter) {
        match self {
            TransactionOutput::Key { amount, key } => {
                w.write_varint(*amount);
                w.write_u8(OUTPUT_TAG_KEY);
                w.write_bytes(key.as_bytes());
            }
        }
    }

    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let amount = r.read_varint("output amount")?;
        let tag = r.read_u8("output type")?;
        if tag != OUTPUT_TAG_KEY {
            return Err(WireError::unknown("transaction output type", u64::from(tag)));
        }
        let key = Hash(r.read_array::<HASH_SIZE>("output key")?);
        Ok(TransactionOutput::Key { amount, key })
    }
}

/// Lazily computed content hashes. `OnceLock` keeps finalized transactions
/// shareable across threads for read-only use.
#[derive(Debug, Clone, Default)]
struct HashCache {
    full: OnceLock<Hash>,
    prefix: OnceLock<Hash>,
}

/// An immutable, fully validated transaction.
///
/// Produced by [`Transaction::decode`] (wire bytes, raw extra preserved
/// verbatim) or [`TransactionBuilder::build`] (canonical extra encoding).
#[derive(Debug, Clone)]
pub struct Transaction {
    version: u64,
    unlock_time: u128,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    extra: Vec<ExtraField>,
    /// Present when parsed from the wire; re-emitted verbatim on encode.
    raw_extra: Option<Vec<u8>>,
    signatures: Vec<Vec<Signature>>,
    cache: HashCache,
}

impl Transaction {
    /// Parses a transaction from its wire bytes.
    ///
    /// Strict outside the extra region: unknown type selectors, truncated
    /// structures, and unstructured trailing bytes all reject the whole
    /// blob. The extra region itself is parsed tolerantly (see
    /// [`extra`](self::extra)) and its raw bytes are kept for byte-exact
    /// re-encoding.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);

        let version = r.read_varint("transaction version")?;
        let unlock_time = r.read_varint_u128("unlock time")?;

        let input_count = r.read_varint("input count")?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            inputs.push(TransactionInput::read(&mut r)?);
        }

        let output_count = r.read_varint("output count")?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            outputs.push(TransactionOutput::read(&mut r)?);
        }

        let extra_len = r.read_varint("extra length")?;
        let extra_len =
            usize::try_from(extra_len).map_err(|_| WireError::malformed("extra length"))?;
        let raw_extra = r.read_bytes(extra_len, "extra region")?.to_vec();
        let extra = extra::read_extra(&raw_extra);

        // Anything left must be exactly one 64-byte signature per key offset,
        // grouped per key input in input order.
        let mut signatures = Vec::new();
        if r.remaining() > 0 && r.remaining() % SIGNATURE_SIZE == 0 {
            for input in &inputs {
                if let TransactionInput::Key { key_offsets, .. } = input {
                    let mut group = Vec::with_capacity(key_offsets.len());
                    for _ in key_offsets {
                        group.push(Signature(r.read_array::<SIGNATURE_SIZE>("ring signature")?));
                    }
                    signatures.push(group);
                }
            }
        }
        if r.remaining() > 0 {
            return Err(WireError::malformed(
                "unstructured trailing transaction bytes",
            ));
        }

        trace!(
            version,
            inputs = inputs.len(),
            outputs = outputs.len(),
            extra_fields = extra.len(),
            "decoded transaction"
        );

        Ok(Transaction {
            version,
            unlock_time,
            inputs,
            outputs,
            extra,
            raw_extra: Some(raw_extra),
            signatures,
            cache: HashCache::default(),
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn unlock_time(&self) -> u128 {
        self.unlock_time
    }

    pub fn inputs(&self) -> &[TransactionInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    /// The structured fields recovered from the extra region.
    pub fn extra_fields(&self) -> &[ExtraField] {
        &self.extra
    }

    /// The extra region bytes as they will appear on the wire: the parsed
    /// raw bytes when this transaction came from the wire, otherwise the
    /// canonical encoding of the structured fields.
    pub fn extra_bytes(&self) -> Vec<u8> {
        match &self.raw_extra {
            Some(raw) => raw.clone(),
            None => extra::write_extra(&self.extra),
        }
    }

    pub fn signatures(&self) -> &[Vec<Signature>] {
        &self.signatures
    }

    /// The transaction public key from the extra region, if present.
    pub fn public_key(&self) -> Option<Hash> {
        extra::find_public_key(&self.extra)
    }

    /// The payment id from the extra nonce container, if present.
    pub fn payment_id(&self) -> Option<Hash> {
        extra::find_payment_id(&self.extra)
    }

    /// Arbitrary data from the extra nonce container, if present.
    pub fn extra_data(&self) -> Option<&[u8]> {
        extra::find_extra_data(&self.extra)
    }

    /// Merged-mining depth and merkle root, if present.
    pub fn merged_mining(&self) -> Option<(u64, Hash)> {
        extra::find_merged_mining(&self.extra)
    }

    /// Total amount consumed by key inputs.
    pub fn input_amount(&self) -> u64 {
        self.inputs
            .iter()
            .map(|input| match input {
                TransactionInput::Key { amount, .. } => *amount,
                TransactionInput::Coinbase { .. } => 0,
            })
            .fold(0u64, u64::saturating_add)
    }

    /// Total amount assigned to outputs.
    pub fn output_amount(&self) -> u64 {
        self.outputs
            .iter()
            .map(TransactionOutput::amount)
            .fold(0u64, u64::saturating_add)
    }

    /// Network fee: inputs minus outputs, zero for coinbase transactions.
    pub fn fee(&self) -> u64 {
        let input = self.input_amount();
        if input == 0 {
            return 0;
        }
        input.saturating_sub(self.output_amount())
    }

    /// Full wire encoding, signatures included.
    pub fn encode(&self) -> Vec<u8> {
        let extra = self.extra_bytes();
        let mut w = ByteWriter::new();
        write_transaction(
            &mut w,
            self.version,
            self.unlock_time,
            &self.inputs,
            &self.outputs,
            &extra,
            Some(&self.signatures),
        );
        w.into_vec()
    }

    /// Header-only encoding (version, unlock time, inputs, outputs, extra) —
    /// the form that is hashed for signing.
    pub fn encode_prefix(&self) -> Vec<u8> {
        let extra = self.extra_bytes();
        let mut w = ByteWriter::new();
        write_transaction(
            &mut w,
            self.version,
            self.unlock_time,
            &self.inputs,
            &self.outputs,
            &extra,
            None,
        );
        w.into_vec()
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.encode().len()
    }

    /// The published transaction hash (version-dependent double hashing).
    pub fn hash(&self) -> Hash {
        *self
            .cache
            .full
            .get_or_init(|| content_hash(&self.encode(), self.version))
    }

    /// The transaction prefix hash (same rule over the header-only bytes).
    pub fn prefix_hash(&self) -> Hash {
        *self
            .cache
            .prefix
            .get_or_init(|| content_hash(&self.encode_prefix(), self.version))
    }
}

/// A mutable transaction under construction.
///
/// The builder is the only place mutation exists; every mutator drops the
/// cached hashes so the next hash request recomputes from current state.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    version: u64,
    unlock_time: u128,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    extra: Vec<ExtraField>,
    signatures: Vec<Vec<Signature>>,
    cache: HashCache,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            version: 1,
            unlock_time: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            extra: Vec::new(),
            signatures: Vec::new(),
            cache: HashCache::default(),
        }
    }

    fn touch(&mut self) {
        self.cache = HashCache::default();
    }

    pub fn set_version(&mut self, version: u64) -> &mut Self {
        self.version = version;
        self.touch();
        self
    }

    pub fn set_unlock_time(&mut self, unlock_time: u128) -> &mut Self {
        self.unlock_time = unlock_time;
        self.touch();
        self
    }

    pub fn add_input(&mut self, input: TransactionInput) -> &mut Self {
        self.inputs.push(input);
        self.touch();
        self
    }

    pub fn add_output(&mut self, output: TransactionOutput) -> &mut Self {
        self.outputs.push(output);
        self.touch();
        self
    }

    /// Appends the signature group for the next key input, in input order.
    pub fn add_signature_group(&mut self, group: Vec<Signature>) -> &mut Self {
        self.signatures.push(group);
        self.touch();
        self
    }

    /// Sets the transaction public key, replacing any existing one. The
    /// extra list is kept in ascending tag order.
    pub fn add_public_key(&mut self, key: Hash) -> &mut Self {
        extra::upsert_field(&mut self.extra, ExtraField::PublicKey(key));
        self.touch();
        self
    }

    /// Sets the payment id inside the nonce container, creating the
    /// container if needed.
    pub fn add_payment_id(&mut self, payment_id: Hash) -> &mut Self {
        extra::upsert_nonce_field(&mut self.extra, NonceField::PaymentId(payment_id));
        self.touch();
        self
    }

    /// Sets the arbitrary data blob inside the nonce container, creating
    /// the container if needed.
    pub fn add_data(&mut self, data: Vec<u8>) -> &mut Self {
        extra::upsert_nonce_field(&mut self.extra, NonceField::Data(data));
        self.touch();
        self
    }

    /// Sets the merged-mining proof, replacing any existing one.
    pub fn add_merged_mining(&mut self, depth: u64, merkle_root: Hash) -> &mut Self {
        extra::upsert_field(&mut self.extra, ExtraField::MergedMining { depth, merkle_root });
        self.touch();
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn extra_fields(&self) -> &[ExtraField] {
        &self.extra
    }

    pub fn public_key(&self) -> Option<Hash> {
        extra::find_public_key(&self.extra)
    }

    /// Verifies the signature-grouping invariant: when any signatures are
    /// present there must be one group per key input, each as long as that
    /// input's key-offset list.
    fn check_signatures(&self) -> Result<()> {
        if self.signatures.is_empty() {
            return Ok(());
        }
        let key_inputs: Vec<&TransactionInput> =
            self.inputs.iter().filter(|i| !i.is_coinbase()).collect();
        if key_inputs.len() != self.signatures.len() {
            return Err(WireError::InvariantViolation(format!(
                "{} key input(s) but {} signature group(s)",
                key_inputs.len(),
                self.signatures.len()
            )));
        }
        for (index, (input, group)) in key_inputs.iter().zip(&self.signatures).enumerate() {
            if let TransactionInput::Key { key_offsets, .. } = input {
                if key_offsets.len() != group.len() {
                    return Err(WireError::InvariantViolation(format!(
                        "input {} has {} key offset(s) but {} signature(s)",
                        index,
                        key_offsets.len(),
                        group.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Full wire encoding. Fails with [`WireError::InvariantViolation`] when
    /// the signature groups do not match the inputs.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.check_signatures()?;
        let extra = extra::write_extra(&self.extra);
        let mut w = ByteWriter::new();
        write_transaction(
            &mut w,
            self.version,
            self.unlock_time,
            &self.inputs,
            &self.outputs,
            &extra,
            Some(&self.signatures),
        );
        Ok(w.into_vec())
    }

    /// Header-only encoding; signatures are never involved.
    pub fn encode_prefix(&self) -> Vec<u8> {
        let extra = extra::write_extra(&self.extra);
        let mut w = ByteWriter::new();
        write_transaction(
            &mut w,
            self.version,
            self.unlock_time,
            &self.inputs,
            &self.outputs,
            &extra,
            None,
        );
        w.into_vec()
    }

    /// The published hash of the current state, cached until the next
    /// mutation.
    pub fn hash(&self) -> Result<Hash> {
        if let Some(hash) = self.cache.full.get() {
            return Ok(*hash);
        }
        let hash = content_hash(&self.encode()?, self.version);
        Ok(*self.cache.full.get_or_init(|| hash))
    }

    /// The prefix hash of the current state, cached until the next mutation.
    pub fn prefix_hash(&self) -> Hash {
        *self
            .cache
            .prefix
            .get_or_init(|| content_hash(&self.encode_prefix(), self.version))
    }

    /// Finalizes the builder into an immutable [`Transaction`].
    pub fn build(self) -> Result<Transaction> {
        self.check_signatures()?;
        Ok(Transaction {
            version: self.version,
            unlock_time: self.unlock_time,
            inputs: self.inputs,
            outputs: self.outputs,
            extra: self.extra,
            raw_extra: None,
            signatures: self.signatures,
            cache: HashCache::default(),
        })
    }
}

fn write_transaction(
    w: &mut ByteWriter,
    version: u64,
    unlock_time: u128,
    inputs: &[TransactionInput],
    outputs: &[TransactionOutput],
    extra: &[u8],
    signatures: Option<&[Vec<Signature>]>,
) {
    w.write_varint(version);
    w.write_varint_u128(unlock_time);
    w.write_varint(inputs.len() as u64);
    for input in inputs {
        input.write(w);
    }
    w.write_varint(outputs.len() as u64);
    for output in outputs {
        output.write(w);
    }
    w.write_varint(extra.len() as u64);
    w.write_bytes(extra);
    if let Some(groups) = signatures {
        for group in groups {
            for signature in group {
                w.write_bytes(signature.as_bytes());
            }
        }
    }
}
