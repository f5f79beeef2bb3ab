//! # cryptonote-wire
//!
//! Byte-exact wire-format core for CryptoNote-family nodes and wallets.
//!
//! Two tightly coupled codecs make up the crate:
//!
//! - the **transaction codec** ([`transaction`]), including the tagged
//!   "extra" extension area with its duplicate-tolerant, attacker-resistant
//!   parsing and the version-dependent double hashing
//! - the **Levin framer** ([`levin`]), the fixed-header peer-protocol
//!   envelope multiplexing thirteen command codes, with structured payload
//!   bodies carried in a typed key-value container
//!
//! Both parse and re-serialize attacker-controllable input: a wallet must
//! skip malformed optional fields without corrupting the surrounding data,
//! and a node must never misinterpret one peer's message as another command.
//!
//! ## What this crate is not
//! No sockets, no consensus rules, no balances, and no cryptography beyond
//! the Keccak-256 content hash. Callers own transport and validation policy;
//! any decode error from this crate means the whole message is rejected.
//!
//! ## Quick Start
//! ```rust
//! use cryptonote_wire::levin::{LevinCommand, LevinPacket, Ping};
//!
//! # fn main() -> cryptonote_wire::Result<()> {
//! let packet = LevinPacket::request(Ping {
//!     status: Ping::STATUS_OK.to_owned(),
//!     peer_id: 0x0123_4567_89ab_cdef,
//! });
//! let bytes = packet.encode();
//!
//! let decoded = LevinPacket::decode(&bytes)?;
//! assert_eq!(decoded.command(), LevinCommand::Ping);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod levin;
pub mod transaction;

pub use crate::core::hash::{Hash, Signature, HASH_SIZE, SIGNATURE_SIZE};
pub use crate::core::storage::{PortableStorage, StorageValue};
pub use config::ProtocolConfig;
pub use error::{Result, WireError};
pub use levin::{LevinCommand, LevinFrameCodec, LevinPacket, LevinPayload};
pub use transaction::{Transaction, TransactionBuilder, TransactionInput, TransactionOutput};
