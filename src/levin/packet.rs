//! # Levin Packet Framing
//!
//! The fixed 33-byte header envelope and the command dispatch that binds a
//! header to its payload body.
//!
//! ## Wire Format
//! ```text
//! [Signature(8, byte-reversed)] [BodyLength(u64 LE)] [ReturnData(u8)]
//! [Command(u32 LE)] [ReturnCode(i32 LE)] [Flags(i32 LE)] [Version(u32 LE)]
//! [Body(BodyLength)]
//! ```
//!
//! The command set is closed: dispatch is an exhaustive match over
//! [`LevinCommand`], and the reserved code (2005) has no constructible
//! payload, so a packet carrying it can exist neither in memory nor as the
//! output of a decode. A packet's command is always derived from its
//! payload; there is no way to point a header at the wrong body.

use crate::core::cursor::{ByteReader, ByteWriter};
use crate::error::{Result, WireError};
use crate::levin::payload::{
    Handshake, LiteBlock, MissingTransactions, NewBlock, NewTransactions, PayloadBody, Ping,
    RequestChain, RequestGetObjects, RequestTxPool, ResponseChain, ResponseGetObjects, TimedSync,
};
use tracing::trace;

/// The packet signature in logical byte order; reversed on the wire.
pub const LEVIN_SIGNATURE: [u8; 8] = [0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x21, 0x01];

/// Serialized header size; the minimum size of any valid packet.
pub const LEVIN_HEADER_SIZE: usize = 33;

/// Default protocol version stamped on new packets.
pub const LEVIN_PROTOCOL_VERSION: u32 = 1;

/// Wire code reserved between ResponseGetObjects and RequestChain; never a
/// valid command.
pub const RESERVED_COMMAND_CODE: u32 = 2005;

/// The closed set of Levin command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevinCommand {
    Handshake,
    TimedSync,
    Ping,
    NewBlock,
    NewTransactions,
    RequestGetObjects,
    ResponseGetObjects,
    RequestChain,
    ResponseChain,
    RequestTxPool,
    LiteBlock,
    MissingTransactions,
}

impl LevinCommand {
    /// The command's wire code.
    pub fn code(self) -> u32 {
        match self {
            LevinCommand::Handshake => 1001,
            LevinCommand::TimedSync => 1002,
            LevinCommand::Ping => 1003,
            LevinCommand::NewBlock => 2001,
            LevinCommand::NewTransactions => 2002,
            LevinCommand::RequestGetObjects => 2003,
            LevinCommand::ResponseGetObjects => 2004,
            LevinCommand::RequestChain => 2006,
            LevinCommand::ResponseChain => 2007,
            LevinCommand::RequestTxPool => 2008,
            LevinCommand::LiteBlock => 2009,
            LevinCommand::MissingTransactions => 2010,
        }
    }

    /// The command's default-constructed payload body.
    pub fn default_payload(self) -> LevinPayload {
        match self {
            LevinCommand::Handshake => LevinPayload::Handshake(Handshake::default()),
            LevinCommand::TimedSync => LevinPayload::TimedSync(TimedSync::default()),
            LevinCommand::Ping => LevinPayload::Ping(Ping::default()),
            LevinCommand::NewBlock => LevinPayload::NewBlock(NewBlock::default()),
            LevinCommand::NewTransactions => {
                LevinPayload::NewTransactions(NewTransactions::default())
            }
            LevinCommand::RequestGetObjects => {
                LevinPayload::RequestGetObjects(RequestGetObjects::default())
            }
            LevinCommand::ResponseGetObjects => {
                LevinPayload::ResponseGetObjects(ResponseGetObjects::default())
            }
            LevinCommand::RequestChain => LevinPayload::RequestChain(RequestChain::default()),
            LevinCommand::ResponseChain => LevinPayload::ResponseChain(ResponseChain::default()),
            LevinCommand::RequestTxPool => LevinPayload::RequestTxPool(RequestTxPool::default()),
            LevinCommand::LiteBlock => LevinPayload::LiteBlock(LiteBlock::default()),
            LevinCommand::MissingTransactions => {
                LevinPayload::MissingTransactions(MissingTransactions::default())
            }
        }
    }
}

impl TryFrom<u32> for LevinCommand {
    type Error = WireError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            1001 => Ok(LevinCommand::Handshake),
            1002 => Ok(LevinCommand::TimedSync),
            1003 => Ok(LevinCommand::Ping),
            2001 => Ok(LevinCommand::NewBlock),
            2002 => Ok(LevinCommand::NewTransactions),
            2003 => Ok(LevinCommand::RequestGetObjects),
            2004 => Ok(LevinCommand::ResponseGetObjects),
            2006 => Ok(LevinCommand::RequestChain),
            2007 => Ok(LevinCommand::ResponseChain),
            2008 => Ok(LevinCommand::RequestTxPool),
            2009 => Ok(LevinCommand::LiteBlock),
            2010 => Ok(LevinCommand::MissingTransactions),
            // 2005 is reserved; it falls through with every other unknown.
            other => Err(WireError::unknown("levin command", u64::from(other))),
        }
    }
}

impl From<LevinCommand> for u32 {
    fn from(command: LevinCommand) -> u32 {
        command.code()
    }
}

/// A command payload, one variant per constructible command.
#[derive(Debug, Clone)]
pub enum LevinPayload {
    Handshake(Handshake),
    TimedSync(TimedSync),
    Ping(Ping),
    NewBlock(NewBlock),
    NewTransactions(NewTransactions),
    RequestGetObjects(RequestGetObjects),
    ResponseGetObjects(ResponseGetObjects),
    RequestChain(RequestChain),
    ResponseChain(ResponseChain),
    RequestTxPool(RequestTxPool),
    LiteBlock(LiteBlock),
    MissingTransactions(MissingTransactions),
}

impl LevinPayload {
    /// The command this payload answers to.
    pub fn command(&self) -> LevinCommand {
        match self {
            LevinPayload::Handshake(_) => LevinCommand::Handshake,
            LevinPayload::TimedSync(_) => LevinCommand::TimedSync,
            LevinPayload::Ping(_) => LevinCommand::Ping,
            LevinPayload::NewBlock(_) => LevinCommand::NewBlock,
            LevinPayload::NewTransactions(_) => LevinCommand::NewTransactions,
            LevinPayload::RequestGetObjects(_) => LevinCommand::RequestGetObjects,
            LevinPayload::ResponseGetObjects(_) => LevinCommand::ResponseGetObjects,
            LevinPayload::RequestChain(_) => LevinCommand::RequestChain,
            LevinPayload::ResponseChain(_) => LevinCommand::ResponseChain,
            LevinPayload::RequestTxPool(_) => LevinCommand::RequestTxPool,
            LevinPayload::LiteBlock(_) => LevinCommand::LiteBlock,
            LevinPayload::MissingTransactions(_) => LevinCommand::MissingTransactions,
        }
    }

    /// Serializes the body for the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            LevinPayload::Handshake(p) => p.encode(),
            LevinPayload::TimedSync(p) => p.encode(),
            LevinPayload::Ping(p) => p.encode(),
            LevinPayload::NewBlock(p) => p.encode(),
            LevinPayload::NewTransactions(p) => p.encode(),
            LevinPayload::RequestGetObjects(p) => p.encode(),
            LevinPayload::ResponseGetObjects(p) => p.encode(),
            LevinPayload::RequestChain(p) => p.encode(),
            LevinPayload::ResponseChain(p) => p.encode(),
            LevinPayload::RequestTxPool(p) => p.encode(),
            LevinPayload::LiteBlock(p) => p.encode(),
            LevinPayload::MissingTransactions(p) => p.encode(),
        }
    }

    /// Parses the body bytes for `command`.
    pub fn decode(command: LevinCommand, data: &[u8]) -> Result<Self> {
        Ok(match command {
            LevinCommand::Handshake => LevinPayload::Handshake(Handshake::decode(data)?),
            LevinCommand::TimedSync => LevinPayload::TimedSync(TimedSync::decode(data)?),
            LevinCommand::Ping => LevinPayload::Ping(Ping::decode(data)?),
            LevinCommand::NewBlock => LevinPayload::NewBlock(NewBlock::decode(data)?),
            LevinCommand::NewTransactions => {
                LevinPayload::NewTransactions(NewTransactions::decode(data)?)
            }
            LevinCommand::RequestGetObjects => {
                LevinPayload::RequestGetObjects(RequestGetObjects::decode(data)?)
            }
            LevinCommand::ResponseGetObjects => {
                LevinPayload::ResponseGetObjects(ResponseGetObjects::decode(data)?)
            }
            LevinCommand::RequestChain => LevinPayload::RequestChain(RequestChain::decode(data)?),
            LevinCommand::ResponseChain => {
                LevinPayload::ResponseChain(ResponseChain::decode(data)?)
            }
            LevinCommand::RequestTxPool => {
                LevinPayload::RequestTxPool(RequestTxPool::decode(data)?)
            }
            LevinCommand::LiteBlock => LevinPayload::LiteBlock(LiteBlock::decode(data)?),
            LevinCommand::MissingTransactions => {
                LevinPayload::MissingTransactions(MissingTransactions::decode(data)?)
            }
        })
    }
}

macro_rules! payload_from {
    ($($body:ident),* $(,)?) => {
        $(
            impl From<$body> for LevinPayload {
                fn from(body: $body) -> Self {
                    LevinPayload::$body(body)
                }
            }
        )*
    };
}

payload_from!(
    Handshake,
    TimedSync,
    Ping,
    NewBlock,
    NewTransactions,
    RequestGetObjects,
    ResponseGetObjects,
    RequestChain,
    ResponseChain,
    RequestTxPool,
    LiteBlock,
    MissingTransactions,
);

/// One framed protocol message.
///
/// Constructed once from a payload; the header's command field is always
/// derived from the payload variant, and the body length from its encoding.
#[derive(Debug, Clone)]
pub struct LevinPacket {
    /// Whether the sender expects a response to this packet.
    pub return_data: bool,
    /// Response status code; zero on requests.
    pub return_code: i32,
    /// Transport flags (request/response bits in the reference daemons).
    pub flags: i32,
    /// Protocol version stamped in the header.
    pub protocol_version: u32,
    /// The command body; also determines the command code.
    pub payload: LevinPayload,
}

impl LevinPacket {
    /// A packet with default header fields around `payload`.
    pub fn new(payload: impl Into<LevinPayload>) -> Self {
        LevinPacket {
            return_data: false,
            return_code: 0,
            flags: 0,
            protocol_version: LEVIN_PROTOCOL_VERSION,
            payload: payload.into(),
        }
    }

    /// A packet that asks the peer to respond.
    pub fn request(payload: impl Into<LevinPayload>) -> Self {
        LevinPacket {
            return_data: true,
            ..LevinPacket::new(payload)
        }
    }

    /// The command code derived from the payload.
    pub fn command(&self) -> LevinCommand {
        self.payload.command()
    }

    /// Parses exactly one packet from `data`.
    ///
    /// The buffer must contain the whole packet and nothing else; feed
    /// multi-packet streams through
    /// [`LevinFrameCodec`](crate::levin::codec::LevinFrameCodec) instead.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < LEVIN_HEADER_SIZE {
            return Err(WireError::truncated(
                "levin header",
                LEVIN_HEADER_SIZE - data.len(),
            ));
        }
        let mut r = ByteReader::new(data);

        let mut signature = r.read_array::<8>("levin signature")?;
        signature.reverse();
        if signature != LEVIN_SIGNATURE {
            return Err(WireError::malformed("levin packet signature"));
        }

        let body_length = r.read_u64_le("levin body length")?;
        let body_length = usize::try_from(body_length)
            .map_err(|_| WireError::malformed("levin body length"))?;
        let return_data = r.read_u8("levin return-data flag")? == 1;
        let command_code = r.read_u32_le("levin command")?;
        let return_code = r.read_i32_le("levin return code")?;
        let flags = r.read_i32_le("levin flags")?;
        let protocol_version = r.read_u32_le("levin protocol version")?;

        let body = r.read_bytes(body_length, "levin body")?;
        if !r.is_empty() {
            return Err(WireError::malformed("trailing bytes after levin body"));
        }

        let command = LevinCommand::try_from(command_code)?;
        trace!(command = ?command, body_length, "decoding levin packet");
        let payload = LevinPayload::decode(command, body)?;

        Ok(LevinPacket {
            return_data,
            return_code,
            flags,
            protocol_version,
            payload,
        })
    }

    /// Serializes the packet; the body length field is always derived from
    /// the freshly encoded payload.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.payload.encode();
        let mut w = ByteWriter::with_capacity(LEVIN_HEADER_SIZE + body.len());
        let mut signature = LEVIN_SIGNATURE;
        signature.reverse();
        w.write_bytes(&signature);
        w.write_u64_le(body.len() as u64);
        w.write_u8(u8::from(self.return_data));
        w.write_u32_le(self.command().code());
        w.write_i32_le(self.return_code);
        w.write_i32_le(self.flags);
        w.write_u32_le(self.protocol_version);
        w.write_bytes(&body);
        w.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes_match_the_wire_table() {
        let table = [
            (LevinCommand::Handshake, 1001),
            (LevinCommand::TimedSync, 1002),
            (LevinCommand::Ping, 1003),
            (LevinCommand::NewBlock, 2001),
            (LevinCommand::NewTransactions, 2002),
            (LevinCommand::RequestGetObjects, 2003),
            (LevinCommand::ResponseGetObjects, 2004),
            (LevinCommand::RequestChain, 2006),
            (LevinCommand::ResponseChain, 2007),
            (LevinCommand::RequestTxPool, 2008),
            (LevinCommand::LiteBlock, 2009),
            (LevinCommand::MissingTransactions, 2010),
        ];
        for (command, code) in table {
            assert_eq!(command.code(), code);
            assert_eq!(LevinCommand::try_from(code).expect("known code"), command);
            assert_eq!(command.default_payload().command(), command);
        }
    }

    #[test]
    fn reserved_code_is_not_a_command() {
        assert!(matches!(
            LevinCommand::try_from(RESERVED_COMMAND_CODE),
            Err(WireError::UnknownVariant { kind: "levin command", value: 2005 })
        ));
    }

    #[test]
    fn ping_packet_roundtrip() {
        let packet = LevinPacket::request(Ping {
            status: Ping::STATUS_OK.to_owned(),
            peer_id: 7,
        });
        let bytes = packet.encode();
        assert!(bytes.len() >= LEVIN_HEADER_SIZE);

        let decoded = LevinPacket::decode(&bytes).expect("decode");
        assert_eq!(decoded.command(), LevinCommand::Ping);
        assert!(decoded.return_data);
        assert_eq!(decoded.protocol_version, LEVIN_PROTOCOL_VERSION);
        let LevinPayload::Ping(ping) = decoded.payload else {
            panic!("expected ping payload");
        };
        assert_eq!(ping.peer_id, 7);
        assert_eq!(ping.status, "OK");
    }

    #[test]
    fn signature_is_byte_reversed_on_the_wire() {
        let bytes = LevinPacket::new(Ping::default()).encode();
        assert_eq!(&bytes[..8], &[0x01, 0x21, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01]);
    }

    #[test]
    fn bad_signature_is_malformed() {
        let mut bytes = LevinPacket::new(Ping::default()).encode();
        bytes[0] = 0x02;
        assert!(matches!(
            LevinPacket::decode(&bytes),
            Err(WireError::Malformed { context: "levin packet signature" })
        ));
    }

    #[test]
    fn short_buffer_is_truncated() {
        let bytes = LevinPacket::new(Ping::default()).encode();
        assert!(matches!(
            LevinPacket::decode(&bytes[..20]),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = LevinPacket::new(Ping::default()).encode();
        bytes.push(0x00);
        assert!(matches!(
            LevinPacket::decode(&bytes),
            Err(WireError::Malformed { .. })
        ));
    }

    #[test]
    fn body_length_is_derived_from_payload() {
        let packet = LevinPacket::new(RequestChain {
            block_ids: vec![crate::core::hash::Hash([0x99; 32])],
        });
        let bytes = packet.encode();
        let body_length = u64::from_le_bytes(bytes[8..16].try_into().expect("8 bytes"));
        assert_eq!(body_length as usize, bytes.len() - LEVIN_HEADER_SIZE);
    }
}
