//! # Levin Protocol
//!
//! The peer-to-peer message envelope: a fixed 33-byte header multiplexing
//! thirteen command codes (twelve constructible, one reserved) over a single
//! wire format, plus the structured payload bodies and a stream codec.
//!
//! ## Components
//! - **Packet**: header framing, command dispatch, one-shot encode/decode
//! - **Payload**: the per-command message bodies over portable storage
//! - **Codec**: tokio-util framing for multi-packet byte streams
//!
//! Transport, connection lifecycle, and retry policy belong to the caller;
//! a decode error here means the message (and usually the connection) must
//! be dropped.

pub mod codec;
pub mod packet;
pub mod payload;

pub use codec::LevinFrameCodec;
pub use packet::{
    LevinCommand, LevinPacket, LevinPayload, LEVIN_HEADER_SIZE, LEVIN_PROTOCOL_VERSION,
    LEVIN_SIGNATURE, RESERVED_COMMAND_CODE,
};
pub use payload::{
    Handshake, LiteBlock, MissingTransactions, NewBlock, NewTransactions, PayloadBody, PeerEntry,
    Ping, RawBlock, RequestChain, RequestGetObjects, RequestTxPool, ResponseChain,
    ResponseGetObjects, TimedSync, NETWORK_ID_SIZE, PEER_ENTRY_SIZE,
};
