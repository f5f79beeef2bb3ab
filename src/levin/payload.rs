//! # Levin Payload Bodies
//!
//! The structured message bodies carried by Levin packets, one per command.
//! Every body serializes itself into (and parses itself from) a
//! [`PortableStorage`] container; transactions embedded in a body are decoded
//! recursively with the transaction codec, while blocks stay opaque blobs
//! for the sibling block codec.
//!
//! Hash lists travel as concatenated 32-byte blobs and peer lists as
//! concatenated 24-byte records. Unlike the tolerant tx-extra region, a blob
//! whose length is not an exact multiple of the record size is a hard
//! [`Malformed`](crate::WireError::Malformed) failure: once the outer packet
//! framing validated, payload bodies are expected to be well-formed.

use crate::core::cursor::{ByteReader, ByteWriter};
use crate::core::hash::{Hash, HASH_SIZE};
use crate::core::storage::{PortableStorage, StorageValue};
use crate::error::{Result, WireError};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Size of a serialized peer entry.
pub const PEER_ENTRY_SIZE: usize = 24;
/// Size of a network identifier.
pub const NETWORK_ID_SIZE: usize = 16;

/// Common surface of every Levin payload body: conversion to and from the
/// portable-storage envelope, with byte-level encode/decode on top.
pub trait PayloadBody: Sized {
    fn to_storage(&self) -> PortableStorage;
    fn from_storage(storage: &PortableStorage) -> Result<Self>;

    fn encode(&self) -> Vec<u8> {
        self.to_storage().encode()
    }

    fn decode(data: &[u8]) -> Result<Self> {
        Self::from_storage(&PortableStorage::decode(data)?)
    }
}

/// One peer in an advertised peer list.
///
/// Wire layout (24 bytes): ip u32 LE, port u32 LE, id u64 BE,
/// last-seen timestamp u64 BE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub ip: Ipv4Addr,
    pub port: u32,
    pub id: u64,
    pub last_seen: u64,
}

impl PeerEntry {
    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let ip = Ipv4Addr::from(r.read_u32_le("peer ip")?);
        let port = r.read_u32_le("peer port")?;
        let id = r.read_u64_be("peer id")?;
        let last_seen = r.read_u64_be("peer last-seen")?;
        Ok(PeerEntry {
            ip,
            port,
            id,
            last_seen,
        })
    }

    fn write(&self, w: &mut ByteWriter) {
        w.write_u32_le(u32::from(self.ip));
        w.write_u32_le(self.port);
        w.write_u64_be(self.id);
        w.write_u64_be(self.last_seen);
    }
}

fn peers_to_blob(peers: &[PeerEntry]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(peers.len() * PEER_ENTRY_SIZE);
    for peer in peers {
        peer.write(&mut w);
    }
    w.into_vec()
}

fn blob_to_peers(blob: &[u8]) -> Result<Vec<PeerEntry>> {
    if blob.len() % PEER_ENTRY_SIZE != 0 {
        return Err(WireError::malformed("peer list blob length"));
    }
    let mut r = ByteReader::new(blob);
    let mut peers = Vec::with_capacity(blob.len() / PEER_ENTRY_SIZE);
    while !r.is_empty() {
        peers.push(PeerEntry::read(&mut r)?);
    }
    Ok(peers)
}

fn hashes_to_blob(hashes: &[Hash]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(hashes.len() * HASH_SIZE);
    for hash in hashes {
        blob.extend_from_slice(hash.as_bytes());
    }
    blob
}

fn blob_to_hashes(blob: &[u8], context: &'static str) -> Result<Vec<Hash>> {
    if blob.len() % HASH_SIZE != 0 {
        return Err(WireError::Malformed { context });
    }
    Ok(blob
        .chunks_exact(HASH_SIZE)
        .map(|chunk| Hash::from_slice(chunk).expect("chunk is 32 bytes"))
        .collect())
}

fn txs_to_array(transactions: &[Transaction]) -> Vec<Vec<u8>> {
    transactions.iter().map(Transaction::encode).collect()
}

fn array_to_txs(blobs: &[Vec<u8>]) -> Result<Vec<Transaction>> {
    blobs.iter().map(|blob| Transaction::decode(blob)).collect()
}

fn bytes_to_hash(bytes: &[u8], context: &'static str) -> Result<Hash> {
    Hash::from_slice(bytes).map_err(|_| WireError::Malformed { context })
}

fn get_u32(storage: &PortableStorage, key: &'static str) -> Result<u32> {
    u32::try_from(storage.get_uint(key)?).map_err(|_| WireError::Malformed { context: key })
}

/// First message of a connection: who we are and where our chain stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Handshake {
    pub network_id: [u8; NETWORK_ID_SIZE],
    pub version: u8,
    pub local_time: u64,
    pub my_port: u32,
    pub peer_id: u64,
    pub current_height: u32,
    pub top_id: Hash,
    pub local_peerlist: Vec<PeerEntry>,
}

impl PayloadBody for Handshake {
    fn to_storage(&self) -> PortableStorage {
        let mut node_data = PortableStorage::new();
        node_data.set("network_id", StorageValue::Bytes(self.network_id.to_vec()));
        node_data.set("version", StorageValue::U8(self.version));
        node_data.set("peer_id", StorageValue::U64(self.peer_id));
        node_data.set("local_time", StorageValue::U64(self.local_time));
        node_data.set("my_port", StorageValue::U32(self.my_port));

        let mut payload_data = PortableStorage::new();
        payload_data.set("current_height", StorageValue::U32(self.current_height));
        payload_data.set("top_id", StorageValue::Bytes(self.top_id.as_bytes().to_vec()));

        let mut root = PortableStorage::new();
        root.set("node_data", StorageValue::Object(node_data));
        root.set("payload_data", StorageValue::Object(payload_data));
        if !self.local_peerlist.is_empty() {
            root.set(
                "local_peerlist",
                StorageValue::Bytes(peers_to_blob(&self.local_peerlist)),
            );
        }
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let node_data = storage.get_object("node_data")?;
        let network_id: [u8; NETWORK_ID_SIZE] = node_data
            .get_bytes("network_id")?
            .try_into()
            .map_err(|_| WireError::malformed("network_id"))?;
        let version = u8::try_from(node_data.get_uint("version")?)
            .map_err(|_| WireError::malformed("version"))?;
        let local_time = node_data.get_uint("local_time")?;
        let my_port = get_u32(node_data, "my_port")?;
        let peer_id = node_data.get_uint("peer_id")?;

        let payload_data = storage.get_object("payload_data")?;
        let current_height = get_u32(payload_data, "current_height")?;
        let top_id = bytes_to_hash(payload_data.get_bytes("top_id")?, "top_id")?;

        let local_peerlist = match storage.get("local_peerlist") {
            Some(StorageValue::Bytes(blob)) => blob_to_peers(blob)?,
            Some(_) => return Err(WireError::malformed("local_peerlist")),
            None => Vec::new(),
        };

        Ok(Handshake {
            network_id,
            version,
            local_time,
            my_port,
            peer_id,
            current_height,
            top_id,
            local_peerlist,
        })
    }
}

/// Periodic clock/height exchange with an established peer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimedSync {
    /// Sender's clock; zero means "not supplied" and is omitted on the wire.
    pub local_time: u64,
    pub current_height: u32,
    pub top_id: Hash,
    pub local_peerlist: Vec<PeerEntry>,
}

impl PayloadBody for TimedSync {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        if self.local_time != 0 {
            root.set("local_time", StorageValue::U64(self.local_time));
        }
        let mut payload_data = PortableStorage::new();
        payload_data.set("current_height", StorageValue::U32(self.current_height));
        payload_data.set("top_id", StorageValue::Bytes(self.top_id.as_bytes().to_vec()));
        root.set("payload_data", StorageValue::Object(payload_data));
        if !self.local_peerlist.is_empty() {
            root.set(
                "local_peerlist",
                StorageValue::Bytes(peers_to_blob(&self.local_peerlist)),
            );
        }
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let local_time = if storage.exists("local_time") {
            storage.get_uint("local_time")?
        } else {
            0
        };
        let payload_data = storage.get_object("payload_data")?;
        let current_height = get_u32(payload_data, "current_height")?;
        let top_id = bytes_to_hash(payload_data.get_bytes("top_id")?, "top_id")?;
        let local_peerlist = match storage.get("local_peerlist") {
            Some(StorageValue::Bytes(blob)) => blob_to_peers(blob)?,
            Some(_) => return Err(WireError::malformed("local_peerlist")),
            None => Vec::new(),
        };
        Ok(TimedSync {
            local_time,
            current_height,
            top_id,
            local_peerlist,
        })
    }
}

/// Liveness probe. Both fields are optional on the wire; empty/zero values
/// are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ping {
    pub status: String,
    pub peer_id: u64,
}

impl Ping {
    /// Conventional status string for a healthy peer.
    pub const STATUS_OK: &'static str = "OK";
}

impl PayloadBody for Ping {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        if !self.status.is_empty() {
            root.set("status", StorageValue::Bytes(self.status.as_bytes().to_vec()));
        }
        if self.peer_id != 0 {
            root.set("peer_id", StorageValue::U64(self.peer_id));
        }
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let status = if storage.exists("status") {
            String::from_utf8(storage.get_bytes("status")?.to_vec())
                .map_err(|_| WireError::malformed("status"))?
        } else {
            String::new()
        };
        let peer_id = if storage.exists("peer_id") {
            storage.get_uint("peer_id")?
        } else {
            0
        };
        Ok(Ping { status, peer_id })
    }
}

/// Announcement of a freshly mined block with its transactions.
#[derive(Debug, Clone, Default)]
pub struct NewBlock {
    /// Serialized block, opaque to this crate.
    pub block: Vec<u8>,
    pub transactions: Vec<Transaction>,
    pub current_blockchain_height: u32,
    pub hop: u32,
}

impl PayloadBody for NewBlock {
    fn to_storage(&self) -> PortableStorage {
        let mut block = PortableStorage::new();
        block.set("block", StorageValue::Bytes(self.block.clone()));
        if !self.transactions.is_empty() {
            block.set("txs", StorageValue::BytesArray(txs_to_array(&self.transactions)));
        }

        let mut root = PortableStorage::new();
        root.set("block", StorageValue::Object(block));
        root.set(
            "current_blockchain_height",
            StorageValue::U32(self.current_blockchain_height),
        );
        root.set("hop", StorageValue::U32(self.hop));
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let (block, transactions) = if storage.exists("block") {
            let inner = storage.get_object("block")?;
            let block = inner.get_bytes("block")?.to_vec();
            let transactions = if inner.exists("txs") {
                array_to_txs(inner.get_bytes_array("txs")?)?
            } else {
                Vec::new()
            };
            (block, transactions)
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(NewBlock {
            block,
            transactions,
            current_blockchain_height: get_u32(storage, "current_blockchain_height")?,
            hop: get_u32(storage, "hop")?,
        })
    }
}

/// Relay of transactions entering the pool.
#[derive(Debug, Clone, Default)]
pub struct NewTransactions {
    pub transactions: Vec<Transaction>,
}

impl PayloadBody for NewTransactions {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        root.set("txs", StorageValue::BytesArray(txs_to_array(&self.transactions)));
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let transactions = if storage.exists("txs") {
            array_to_txs(storage.get_bytes_array("txs")?)?
        } else {
            Vec::new()
        };
        Ok(NewTransactions { transactions })
    }
}

/// Request for full blocks and transactions by hash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestGetObjects {
    pub blocks: Vec<Hash>,
    pub transactions: Vec<Hash>,
}

impl PayloadBody for RequestGetObjects {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        if !self.transactions.is_empty() {
            root.set("txs", StorageValue::Bytes(hashes_to_blob(&self.transactions)));
        }
        if !self.blocks.is_empty() {
            root.set("blocks", StorageValue::Bytes(hashes_to_blob(&self.blocks)));
        }
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let blocks = if storage.exists("blocks") {
            blob_to_hashes(storage.get_bytes("blocks")?, "blocks")?
        } else {
            Vec::new()
        };
        let transactions = if storage.exists("txs") {
            blob_to_hashes(storage.get_bytes("txs")?, "txs")?
        } else {
            Vec::new()
        };
        Ok(RequestGetObjects {
            blocks,
            transactions,
        })
    }
}

/// A block with the transactions it contains, as carried in
/// [`ResponseGetObjects`].
#[derive(Debug, Clone, Default)]
pub struct RawBlock {
    /// Serialized block, opaque to this crate.
    pub block: Vec<u8>,
    pub transactions: Vec<Transaction>,
}

/// Answer to [`RequestGetObjects`].
#[derive(Debug, Clone, Default)]
pub struct ResponseGetObjects {
    pub transactions: Vec<Transaction>,
    pub blocks: Vec<RawBlock>,
    pub missed_ids: Vec<Hash>,
    pub current_blockchain_height: u32,
}

impl PayloadBody for ResponseGetObjects {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        if !self.transactions.is_empty() {
            root.set("txs", StorageValue::BytesArray(txs_to_array(&self.transactions)));
        }
        if !self.blocks.is_empty() {
            let blocks = self
                .blocks
                .iter()
                .map(|raw| {
                    let mut entry = PortableStorage::new();
                    entry.set("block", StorageValue::Bytes(raw.block.clone()));
                    if !raw.transactions.is_empty() {
                        entry.set(
                            "txs",
                            StorageValue::BytesArray(txs_to_array(&raw.transactions)),
                        );
                    }
                    entry
                })
                .collect();
            root.set("blocks", StorageValue::ObjectArray(blocks));
        }
        if !self.missed_ids.is_empty() {
            root.set("missed_ids", StorageValue::Bytes(hashes_to_blob(&self.missed_ids)));
        }
        root.set(
            "current_blockchain_height",
            StorageValue::U32(self.current_blockchain_height),
        );
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let transactions = if storage.exists("txs") {
            array_to_txs(storage.get_bytes_array("txs")?)?
        } else {
            Vec::new()
        };
        let blocks = if storage.exists("blocks") {
            storage
                .get_object_array("blocks")?
                .iter()
                .map(|entry| {
                    let block = entry.get_bytes("block")?.to_vec();
                    let transactions = if entry.exists("txs") {
                        array_to_txs(entry.get_bytes_array("txs")?)?
                    } else {
                        Vec::new()
                    };
                    Ok(RawBlock {
                        block,
                        transactions,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        let missed_ids = if storage.exists("missed_ids") {
            blob_to_hashes(storage.get_bytes("missed_ids")?, "missed_ids")?
        } else {
            Vec::new()
        };
        let current_blockchain_height = if storage.exists("current_blockchain_height") {
            get_u32(storage, "current_blockchain_height")?
        } else {
            0
        };
        Ok(ResponseGetObjects {
            transactions,
            blocks,
            missed_ids,
            current_blockchain_height,
        })
    }
}

/// Request for chain continuation: the hashes we already know, newest first,
/// genesis last.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestChain {
    pub block_ids: Vec<Hash>,
}

impl PayloadBody for RequestChain {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        root.set("block_ids", StorageValue::Bytes(hashes_to_blob(&self.block_ids)));
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let block_ids = if storage.exists("block_ids") {
            blob_to_hashes(storage.get_bytes("block_ids")?, "block_ids")?
        } else {
            Vec::new()
        };
        Ok(RequestChain { block_ids })
    }
}

/// Answer to [`RequestChain`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseChain {
    pub start_height: u32,
    pub total_height: u32,
    pub block_ids: Vec<Hash>,
}

impl PayloadBody for ResponseChain {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        root.set("start_height", StorageValue::U32(self.start_height));
        root.set("total_height", StorageValue::U32(self.total_height));
        // Historical key name, kept for wire compatibility.
        root.set("m_block_ids", StorageValue::Bytes(hashes_to_blob(&self.block_ids)));
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let start_height = get_u32(storage, "start_height")?;
        let total_height = get_u32(storage, "total_height")?;
        let block_ids = if storage.exists("m_block_ids") {
            blob_to_hashes(storage.get_bytes("m_block_ids")?, "m_block_ids")?
        } else {
            Vec::new()
        };
        Ok(ResponseChain {
            start_height,
            total_height,
            block_ids,
        })
    }
}

/// Request for specific transactions out of a peer's pool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestTxPool {
    pub transactions: Vec<Hash>,
}

impl PayloadBody for RequestTxPool {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        root.set("txs", StorageValue::Bytes(hashes_to_blob(&self.transactions)));
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let transactions = if storage.exists("txs") {
            blob_to_hashes(storage.get_bytes("txs")?, "txs")?
        } else {
            Vec::new()
        };
        Ok(RequestTxPool { transactions })
    }
}

/// Compact block announcement carrying only the block template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiteBlock {
    /// Serialized block template, opaque to this crate.
    pub block_template: Vec<u8>,
    pub current_blockchain_height: u32,
    pub hop: u32,
}

impl PayloadBody for LiteBlock {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        root.set(
            "current_blockchain_height",
            StorageValue::U32(self.current_blockchain_height),
        );
        root.set("hop", StorageValue::U32(self.hop));
        root.set("blockTemplate", StorageValue::Bytes(self.block_template.clone()));
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        Ok(LiteBlock {
            current_blockchain_height: get_u32(storage, "current_blockchain_height")?,
            hop: get_u32(storage, "hop")?,
            block_template: storage.get_bytes("blockTemplate")?.to_vec(),
        })
    }
}

/// Follow-up to a [`LiteBlock`]: the transactions we could not reconstruct.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MissingTransactions {
    pub current_blockchain_height: u32,
    pub block_hash: Hash,
    pub missing_txs: Vec<Hash>,
}

impl PayloadBody for MissingTransactions {
    fn to_storage(&self) -> PortableStorage {
        let mut root = PortableStorage::new();
        root.set(
            "current_blockchain_height",
            StorageValue::U32(self.current_blockchain_height),
        );
        root.set(
            "blockHash",
            StorageValue::Bytes(self.block_hash.as_bytes().to_vec()),
        );
        root.set("missing_txs", StorageValue::Bytes(hashes_to_blob(&self.missing_txs)));
        root
    }

    fn from_storage(storage: &PortableStorage) -> Result<Self> {
        let current_blockchain_height = get_u32(storage, "current_blockchain_height")?;
        let block_hash = bytes_to_hash(storage.get_bytes("blockHash")?, "blockHash")?;
        let missing_txs = if storage.exists("missing_txs") {
            blob_to_hashes(storage.get_bytes("missing_txs")?, "missing_txs")?
        } else {
            Vec::new()
        };
        Ok(MissingTransactions {
            current_blockchain_height,
            block_hash,
            missing_txs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TransactionBuilder, TransactionInput, TransactionOutput};

    fn hash(byte: u8) -> Hash {
        Hash([byte; HASH_SIZE])
    }

    fn peer(last_octet: u8) -> PeerEntry {
        PeerEntry {
            ip: Ipv4Addr::new(10, 0, 0, last_octet),
            port: 11897,
            id: 0x0102_0304_0506_0708,
            last_seen: 1_596_000_000,
        }
    }

    fn tx() -> Transaction {
        let mut builder = TransactionBuilder::new();
        builder
            .add_input(TransactionInput::Coinbase { block_index: 9 })
            .add_output(TransactionOutput::Key {
                amount: 100,
                key: hash(0x77),
            })
            .add_public_key(hash(0x78));
        builder.build().expect("build")
    }

    #[test]
    fn peer_entry_is_24_bytes_and_roundtrips() {
        let blob = peers_to_blob(&[peer(1), peer(2)]);
        assert_eq!(blob.len(), 2 * PEER_ENTRY_SIZE);
        let peers = blob_to_peers(&blob).expect("peers");
        assert_eq!(peers, vec![peer(1), peer(2)]);
    }

    #[test]
    fn peer_blob_modulus_is_enforced() {
        let mut blob = peers_to_blob(&[peer(1)]);
        blob.pop();
        assert!(matches!(
            blob_to_peers(&blob),
            Err(WireError::Malformed { .. })
        ));
    }

    #[test]
    fn handshake_roundtrip_with_peer_list() {
        let payload = Handshake {
            network_id: *b"\xb5\x0c\x4a\x6c\xcf\x52\x57\x41\x65\xf9\x91\xa4\xb6\xc1\x43\xe9",
            version: 6,
            local_time: 1_596_000_000,
            my_port: 11897,
            peer_id: 0xdead_beef_cafe_f00d,
            current_height: 2_000_000,
            top_id: hash(0x31),
            local_peerlist: vec![peer(1), peer(2), peer(3)],
        };
        let decoded = Handshake::decode(&payload.encode()).expect("decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn handshake_without_peer_list_omits_the_key() {
        let payload = Handshake::default();
        let storage = payload.to_storage();
        assert!(!storage.exists("local_peerlist"));
        assert_eq!(Handshake::decode(&payload.encode()).expect("decode"), payload);
    }

    #[test]
    fn handshake_rejects_bad_network_id_length() {
        let mut storage = Handshake::default().to_storage();
        let mut node_data = storage.get_object("node_data").expect("node_data").clone();
        node_data.set("network_id", StorageValue::Bytes(vec![0; 8]));
        storage.set("node_data", StorageValue::Object(node_data));
        assert!(matches!(
            Handshake::from_storage(&storage),
            Err(WireError::Malformed { context: "network_id" })
        ));
    }

    #[test]
    fn timed_sync_local_time_zero_is_omitted() {
        let payload = TimedSync {
            local_time: 0,
            current_height: 77,
            top_id: hash(0x12),
            local_peerlist: Vec::new(),
        };
        let storage = payload.to_storage();
        assert!(!storage.exists("local_time"));
        assert_eq!(TimedSync::decode(&payload.encode()).expect("decode"), payload);
    }

    #[test]
    fn ping_roundtrip_and_optionality() {
        let payload = Ping {
            status: Ping::STATUS_OK.to_owned(),
            peer_id: 42,
        };
        assert_eq!(Ping::decode(&payload.encode()).expect("decode"), payload);

        let empty = Ping::default();
        let storage = empty.to_storage();
        assert!(!storage.exists("status"));
        assert!(!storage.exists("peer_id"));
        assert_eq!(Ping::decode(&empty.encode()).expect("decode"), empty);
    }

    #[test]
    fn new_transactions_roundtrip_reencodes_identically() {
        let payload = NewTransactions {
            transactions: vec![tx(), tx()],
        };
        let decoded = NewTransactions::decode(&payload.encode()).expect("decode");
        assert_eq!(decoded.transactions.len(), 2);
        assert_eq!(decoded.transactions[0].encode(), payload.transactions[0].encode());
    }

    #[test]
    fn request_chain_modulus_is_enforced() {
        let mut storage = PortableStorage::new();
        storage.set("block_ids", StorageValue::Bytes(vec![0u8; 33]));
        assert!(matches!(
            RequestChain::from_storage(&storage),
            Err(WireError::Malformed { context: "block_ids" })
        ));
    }

    #[test]
    fn response_get_objects_roundtrip() {
        let payload = ResponseGetObjects {
            transactions: vec![tx()],
            blocks: vec![RawBlock {
                block: vec![0xb1, 0xb2, 0xb3],
                transactions: vec![tx()],
            }],
            missed_ids: vec![hash(0x41), hash(0x42)],
            current_blockchain_height: 123_456,
        };
        let decoded = ResponseGetObjects::decode(&payload.encode()).expect("decode");
        assert_eq!(decoded.transactions.len(), 1);
        assert_eq!(decoded.blocks.len(), 1);
        assert_eq!(decoded.blocks[0].block, vec![0xb1, 0xb2, 0xb3]);
        assert_eq!(decoded.blocks[0].transactions.len(), 1);
        assert_eq!(decoded.missed_ids, payload.missed_ids);
        assert_eq!(decoded.current_blockchain_height, 123_456);
    }

    #[test]
    fn response_chain_uses_historical_key() {
        let payload = ResponseChain {
            start_height: 10,
            total_height: 500,
            block_ids: vec![hash(0x01)],
        };
        let storage = payload.to_storage();
        assert!(storage.exists("m_block_ids"));
        assert_eq!(ResponseChain::decode(&payload.encode()).expect("decode"), payload);
    }

    #[test]
    fn missing_transactions_roundtrip() {
        let payload = MissingTransactions {
            current_blockchain_height: 9_000,
            block_hash: hash(0x61),
            missing_txs: vec![hash(0x62), hash(0x63)],
        };
        assert_eq!(
            MissingTransactions::decode(&payload.encode()).expect("decode"),
            payload
        );
    }

    #[test]
    fn lite_block_requires_template() {
        let mut storage = PortableStorage::new();
        storage.set("current_blockchain_height", StorageValue::U32(1));
        storage.set("hop", StorageValue::U32(0));
        assert!(matches!(
            LiteBlock::from_storage(&storage),
            Err(WireError::Malformed { context: "blockTemplate" })
        ));
    }
}
