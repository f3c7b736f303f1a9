//! Protocol error types.

use thiserror::Error;

use crate::packet::PacketType;

/// Errors raised while encoding or decoding MQTT packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid remaining length")]
    InvalidRemainingLength,

    #[error("Incomplete packet: needed {needed} bytes, have {have}")]
    IncompletePacket { needed: usize, have: usize },

    #[error("Invalid packet type: {0}")]
    InvalidPacketType(u8),

    #[error("Unexpected packet from broker: {0:?}")]
    UnexpectedPacket(PacketType),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("Invalid CONNACK: {0}")]
    InvalidConnack(String),

    #[error("Packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("String too long: {0} bytes")]
    StringTooLong(usize),

    #[error("Invalid QoS: {0}")]
    InvalidQoS(u8),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
