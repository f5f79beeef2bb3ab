#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end Levin framing tests: header validation, command dispatch over
//! the full payload set, hash-list modulus rules, and stream reassembly.

use bytes::BytesMut;
use cryptonote_wire::levin::{
    Handshake, LevinCommand, LevinFrameCodec, LevinPacket, LevinPayload, MissingTransactions,
    NewTransactions, PayloadBody, PeerEntry, Ping, RequestChain, ResponseChain, TimedSync,
    LEVIN_HEADER_SIZE, RESERVED_COMMAND_CODE,
};
use cryptonote_wire::transaction::{TransactionBuilder, TransactionInput, TransactionOutput};
use cryptonote_wire::{Hash, PortableStorage, ProtocolConfig, StorageValue, WireError};
use std::net::Ipv4Addr;
use tokio_util::codec::Decoder;

/// Builds a full Levin frame around `body` with the given command code,
/// bypassing the typed constructors so header-level failures can be probed.
fn build_frame(command: u32, body: &[u8]) -> Vec<u8> {
    let mut bytes = vec![];

    // signature, byte-reversed on the wire
    bytes.extend_from_slice(&[0x01, 0x21, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01]);

    bytes.extend_from_slice(&(body.len() as u64).to_le_bytes());
    bytes.push(0); // return_data = false
    bytes.extend_from_slice(&command.to_le_bytes());
    bytes.extend_from_slice(&0i32.to_le_bytes()); // return code
    bytes.extend_from_slice(&0i32.to_le_bytes()); // flags
    bytes.extend_from_slice(&1u32.to_le_bytes()); // protocol version

    bytes.extend_from_slice(body);
    bytes
}

fn hash(byte: u8) -> Hash {
    Hash([byte; 32])
}

// ============================================================================
// HEADER VALIDATION
// ============================================================================

#[test]
fn test_bad_signature_fails_regardless_of_valid_fields() {
    let mut bytes = build_frame(1003, &Ping::default().encode());
    bytes[7] = 0x7f; // corrupt one signature byte
    assert!(matches!(
        LevinPacket::decode(&bytes),
        Err(WireError::Malformed { context: "levin packet signature" })
    ));
}

#[test]
fn test_unknown_command_9999_is_unknown_variant() {
    let bytes = build_frame(9999, &[]);
    assert!(matches!(
        LevinPacket::decode(&bytes),
        Err(WireError::UnknownVariant { kind: "levin command", value: 9999 })
    ));
}

#[test]
fn test_reserved_command_is_not_decodable() {
    let bytes = build_frame(RESERVED_COMMAND_CODE, &[]);
    assert!(matches!(
        LevinPacket::decode(&bytes),
        Err(WireError::UnknownVariant { value: 2005, .. })
    ));
}

#[test]
fn test_buffer_shorter_than_header_is_truncated() {
    let bytes = build_frame(1003, &Ping::default().encode());
    for cut in [0, 1, 16, LEVIN_HEADER_SIZE - 1] {
        assert!(
            matches!(
                LevinPacket::decode(&bytes[..cut]),
                Err(WireError::Truncated { .. })
            ),
            "cut at {cut} should be truncated"
        );
    }
}

#[test]
fn test_body_shorter_than_declared_is_truncated() {
    let bytes = build_frame(1003, &Ping::default().encode());
    assert!(matches!(
        LevinPacket::decode(&bytes[..bytes.len() - 2]),
        Err(WireError::Truncated { .. })
    ));
}

// ============================================================================
// COMMAND DISPATCH ACROSS THE PAYLOAD SET
// ============================================================================

#[test]
fn test_every_constructible_command_roundtrips() {
    let commands = [
        LevinCommand::Handshake,
        LevinCommand::TimedSync,
        LevinCommand::Ping,
        LevinCommand::NewBlock,
        LevinCommand::NewTransactions,
        LevinCommand::RequestGetObjects,
        LevinCommand::ResponseGetObjects,
        LevinCommand::RequestChain,
        LevinCommand::ResponseChain,
        LevinCommand::RequestTxPool,
        LevinCommand::LiteBlock,
        LevinCommand::MissingTransactions,
    ];
    for command in commands {
        let packet = LevinPacket::new(command.default_payload());
        let decoded = LevinPacket::decode(&packet.encode())
            .unwrap_or_else(|e| panic!("{command:?} failed to roundtrip: {e}"));
        assert_eq!(decoded.command(), command);
    }
}

#[test]
fn test_handshake_packet_roundtrip_with_peers() {
    let payload = Handshake {
        network_id: [0x11; 16],
        version: 6,
        local_time: 1_596_000_000,
        my_port: 11897,
        peer_id: 0xfeed_f00d_dead_beef,
        current_height: 1_234_567,
        top_id: hash(0x99),
        local_peerlist: vec![
            PeerEntry {
                ip: Ipv4Addr::new(192, 168, 1, 7),
                port: 11897,
                id: 42,
                last_seen: 1_596_000_100,
            },
            PeerEntry {
                ip: Ipv4Addr::new(10, 1, 2, 3),
                port: 11898,
                id: 43,
                last_seen: 1_596_000_200,
            },
        ],
    };
    let packet = LevinPacket::request(payload.clone());
    let decoded = LevinPacket::decode(&packet.encode()).expect("decode");

    assert_eq!(decoded.command(), LevinCommand::Handshake);
    let LevinPayload::Handshake(out) = decoded.payload else {
        panic!("expected handshake payload");
    };
    assert_eq!(out, payload);
    assert_eq!(out.local_peerlist[0].ip.to_string(), "192.168.1.7");
}

#[test]
fn test_new_transactions_carries_decoded_transactions() {
    let mut builder = TransactionBuilder::new();
    builder
        .add_input(TransactionInput::Coinbase { block_index: 500 })
        .add_output(TransactionOutput::Key {
            amount: 12_345,
            key: hash(0x42),
        })
        .add_public_key(hash(0x43));
    let tx = builder.build().expect("build");
    let tx_hash = tx.hash();

    let packet = LevinPacket::new(NewTransactions {
        transactions: vec![tx],
    });
    let decoded = LevinPacket::decode(&packet.encode()).expect("decode");
    let LevinPayload::NewTransactions(out) = decoded.payload else {
        panic!("expected new-transactions payload");
    };
    assert_eq!(out.transactions.len(), 1);
    assert_eq!(out.transactions[0].hash(), tx_hash);
    assert_eq!(out.transactions[0].public_key(), Some(hash(0x43)));
}

#[test]
fn test_timed_sync_and_missing_transactions_roundtrip() {
    let sync = TimedSync {
        local_time: 1_600_000_000,
        current_height: 42,
        top_id: hash(0x10),
        local_peerlist: Vec::new(),
    };
    let decoded = LevinPacket::decode(&LevinPacket::new(sync.clone()).encode()).expect("decode");
    let LevinPayload::TimedSync(out) = decoded.payload else {
        panic!("expected timed-sync payload");
    };
    assert_eq!(out, sync);

    let missing = MissingTransactions {
        current_blockchain_height: 77,
        block_hash: hash(0x20),
        missing_txs: vec![hash(0x21), hash(0x22), hash(0x23)],
    };
    let decoded = LevinPacket::decode(&LevinPacket::new(missing.clone()).encode()).expect("decode");
    let LevinPayload::MissingTransactions(out) = decoded.payload else {
        panic!("expected missing-transactions payload");
    };
    assert_eq!(out, missing);
}

// ============================================================================
// HASH-LIST MODULUS RULES
// ============================================================================

#[test]
fn test_request_chain_blob_not_multiple_of_32_fails() {
    let mut storage = PortableStorage::new();
    storage.set("block_ids", StorageValue::Bytes(vec![0u8; 65]));
    let bytes = build_frame(2006, &storage.encode());
    assert!(matches!(
        LevinPacket::decode(&bytes),
        Err(WireError::Malformed { context: "block_ids" })
    ));
}

#[test]
fn test_request_chain_valid_blob_roundtrips() {
    let request = RequestChain {
        block_ids: vec![hash(0x01), hash(0x02)],
    };
    let decoded = LevinPacket::decode(&LevinPacket::request(request.clone()).encode())
        .expect("decode");
    let LevinPayload::RequestChain(out) = decoded.payload else {
        panic!("expected request-chain payload");
    };
    assert_eq!(out, request);
}

#[test]
fn test_response_chain_heights_are_required() {
    let mut storage = PortableStorage::new();
    storage.set("start_height", StorageValue::U32(5));
    // total_height missing
    let bytes = build_frame(2007, &storage.encode());
    assert!(matches!(
        LevinPacket::decode(&bytes),
        Err(WireError::Malformed { context: "total_height" })
    ));

    let ok = ResponseChain {
        start_height: 5,
        total_height: 100,
        block_ids: vec![hash(0x09)],
    };
    assert!(LevinPacket::decode(&LevinPacket::new(ok).encode()).is_ok());
}

#[test]
fn test_peer_list_blob_not_multiple_of_24_fails() {
    let mut payload_data = PortableStorage::new();
    payload_data.set("current_height", StorageValue::U32(1));
    payload_data.set("top_id", StorageValue::Bytes(vec![0u8; 32]));

    let mut storage = PortableStorage::new();
    storage.set("payload_data", StorageValue::Object(payload_data));
    storage.set("local_peerlist", StorageValue::Bytes(vec![0u8; 25]));

    let bytes = build_frame(1002, &storage.encode());
    assert!(matches!(
        LevinPacket::decode(&bytes),
        Err(WireError::Malformed { .. })
    ));
}

// ============================================================================
// STREAM REASSEMBLY
// ============================================================================

#[test]
fn test_codec_reassembles_across_arbitrary_chunks() {
    let first = LevinPacket::request(Ping {
        status: "OK".to_owned(),
        peer_id: 1,
    });
    let second = LevinPacket::new(RequestChain {
        block_ids: vec![hash(0x0a); 4],
    });
    let mut stream = first.encode();
    stream.extend_from_slice(&second.encode());

    let mut codec = LevinFrameCodec::new(&ProtocolConfig::default());
    let mut buf = BytesMut::new();
    let mut decoded = Vec::new();

    // Feed the stream seven bytes at a time.
    for chunk in stream.chunks(7) {
        buf.extend_from_slice(chunk);
        while let Some(packet) = codec.decode(&mut buf).expect("decode") {
            decoded.push(packet);
        }
    }

    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].command(), LevinCommand::Ping);
    assert_eq!(decoded[1].command(), LevinCommand::RequestChain);
    assert!(buf.is_empty());
}

#[test]
fn test_codec_rejects_oversized_body_claims() {
    let config = ProtocolConfig::from_toml("max_packet_body = 64").expect("config");
    let mut codec = LevinFrameCodec::new(&config);

    let mut header = build_frame(1003, &[]);
    header.truncate(LEVIN_HEADER_SIZE);
    header[8..16].copy_from_slice(&(1_000_000u64).to_le_bytes());

    let mut buf = BytesMut::from(&header[..]);
    assert!(matches!(
        codec.decode(&mut buf),
        Err(WireError::InvariantViolation(_))
    ));
}
