//! # Levin Stream Codec
//!
//! [`tokio_util::codec`] framing for Levin packets, so a byte stream can be
//! split into packets without owning any socket logic here. The codec only
//! reassembles frames; every validation rule lives in
//! [`LevinPacket`](crate::levin::packet::LevinPacket).
//!
//! ## Security
//! - The advertised body length is checked against the configured maximum
//!   *before* the frame is buffered, so a hostile peer cannot make us hold
//!   an arbitrarily large allocation
//! - The packet signature is verified as soon as the header is visible,
//!   failing the connection before any body bytes arrive

use crate::config::ProtocolConfig;
use crate::error::WireError;
use crate::levin::packet::{LevinPacket, LEVIN_HEADER_SIZE, LEVIN_SIGNATURE};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Frame splitter/assembler for Levin packets over a byte stream.
#[derive(Debug, Clone)]
pub struct LevinFrameCodec {
    max_packet_body: u64,
}

impl LevinFrameCodec {
    pub fn new(config: &ProtocolConfig) -> Self {
        LevinFrameCodec {
            max_packet_body: config.max_packet_body,
        }
    }
}

impl Default for LevinFrameCodec {
    fn default() -> Self {
        LevinFrameCodec::new(&ProtocolConfig::default())
    }
}

impl Decoder for LevinFrameCodec {
    type Item = LevinPacket;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LevinPacket>, WireError> {
        if src.len() < LEVIN_HEADER_SIZE {
            return Ok(None);
        }

        // Fail hostile streams on the first header rather than waiting for
        // a body that may never come.
        let mut signature: [u8; 8] = src[..8].try_into().expect("checked length");
        signature.reverse();
        if signature != LEVIN_SIGNATURE {
            return Err(WireError::malformed("levin packet signature"));
        }

        let body_length = u64::from_le_bytes(src[8..16].try_into().expect("checked length"));
        if body_length > self.max_packet_body {
            return Err(WireError::InvariantViolation(format!(
                "peer advertised a {body_length}-byte body, limit is {}",
                self.max_packet_body
            )));
        }
        let total = LEVIN_HEADER_SIZE + body_length as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.copy_to_bytes(total);
        trace!(frame_len = total, "reassembled levin frame");
        LevinPacket::decode(&frame).map(Some)
    }
}

impl Encoder<LevinPacket> for LevinFrameCodec {
    type Error = WireError;

    fn encode(&mut self, packet: LevinPacket, dst: &mut BytesMut) -> Result<(), WireError> {
        let bytes = packet.encode();
        let body_length = (bytes.len() - LEVIN_HEADER_SIZE) as u64;
        if body_length > self.max_packet_body {
            return Err(WireError::InvariantViolation(format!(
                "outgoing {body_length}-byte body exceeds limit {}",
                self.max_packet_body
            )));
        }
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}
