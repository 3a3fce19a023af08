//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

//
// BFD Control Packet Format (mandatory section only; no authentication,
// no poll/final, no flags beyond what RFC 5880 reserves as always-zero
// on this engine).
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Vers |  0000   |Sta|0 0 0 0 0 0|  Detect Mult  |    Length     |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       My Discriminator                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                      Your Discriminator                       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Desired Min TX Interval                    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                   Required Min RX Interval                    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                 Required Min Echo RX Interval                 |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum SessionState {
    AdminDown = 0,
    Down = 1,
    Init = 2,
    Up = 3,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Packet {
    pub version: u8,
    pub state: SessionState,
    pub detect_multiplier: u8,
    pub length: u8,
    pub my_discriminator: u32,
    pub your_discriminator: u32,
    pub desired_min_tx_interval_us: u32,
    pub required_min_rx_interval_us: u32,
    pub required_min_echo_interval_us: u32,
}

// BFD packet decode errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    ShortPacket { len: usize },
}

// ===== impl SessionState =====

impl Default for SessionState {
    fn default() -> SessionState {
        SessionState::Down
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::AdminDown => write!(f, "AdminDown"),
            SessionState::Down => write!(f, "Down"),
            SessionState::Init => write!(f, "Init"),
            SessionState::Up => write!(f, "Up"),
        }
    }
}

// ===== impl Packet =====

impl Packet {
    pub const VERSION: u8 = 1;
    pub const LENGTH: u8 = 24;

    /// Encodes the packet into a freshly reused 24-byte scratch buffer.
    ///
    /// `scratch` is the session's own `tx_buffer`: it is
    /// cleared and refilled, never reallocated, so repeated transmissions
    /// don't churn the allocator.
    pub fn encode_into(&self, scratch: &mut BytesMut) {
        scratch.clear();
        scratch.put_u8(Self::VERSION << 5);
        scratch.put_u8((self.state as u8) << 6);
        scratch.put_u8(self.detect_multiplier);
        scratch.put_u8(Self::LENGTH);
        scratch.put_u32(self.my_discriminator);
        scratch.put_u32(self.your_discriminator);
        scratch.put_u32(self.desired_min_tx_interval_us);
        scratch.put_u32(self.required_min_rx_interval_us);
        scratch.put_u32(self.required_min_echo_interval_us);
    }

    /// Encodes the packet into a brand new 24-byte buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::LENGTH as usize);
        self.encode_into(&mut buf);
        buf
    }

    /// Decodes a BFD Control packet from a received datagram.
    ///
    /// Packets shorter than the mandatory section are rejected outright.
    /// An out-of-range version or length is recorded on the decoded packet
    /// rather than rejected: the state machine is the one that decides
    /// whether to act on it.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::LENGTH as usize {
            return Err(DecodeError::ShortPacket { len: data.len() });
        }

        let mut buf = Bytes::copy_from_slice(&data[..Self::LENGTH as usize]);
        let first_byte = buf.get_u8();
        let second_byte = buf.get_u8();
        let version = first_byte >> 5;
        let state = SessionState::from_u8(second_byte >> 6)
            .expect("2-bit field always maps to one of the four states");
        let detect_multiplier = buf.get_u8();
        let length = buf.get_u8();
        let my_discriminator = buf.get_u32();
        let your_discriminator = buf.get_u32();
        let desired_min_tx_interval_us = buf.get_u32();
        let required_min_rx_interval_us = buf.get_u32();
        let required_min_echo_interval_us = buf.get_u32();

        Ok(Packet {
            version,
            state,
            detect_multiplier,
            length,
            my_discriminator,
            your_discriminator,
            desired_min_tx_interval_us,
            required_min_rx_interval_us,
            required_min_echo_interval_us,
        })
    }

    /// Whether the decoded packet carries the version/length this engine
    /// speaks. A packet failing this check is still handed to the state
    /// machine; only short packets are dropped before decoding.
    pub fn is_well_formed(&self) -> bool {
        self.version == Self::VERSION && self.length == Self::LENGTH
    }
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::ShortPacket { len } => {
                write!(
                    f,
                    "short packet: {len} bytes, need at least {}",
                    Packet::LENGTH
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}
