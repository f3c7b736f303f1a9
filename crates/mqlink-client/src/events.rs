//! Client events and state types.

use bytes::Bytes;

/// Events delivered to the registered handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connection came up (`true`) or an established connection was lost (`false`).
    Connected(bool),
    /// Publish acknowledgment (QoS 1).
    PubAck(u16),
    /// Subscribe acknowledgment.
    SubAck {
        /// Packet ID of the SUBSCRIBE.
        packet_id: u16,
        /// Granted QoS (0x00-0x02), or 0x80 on failure.
        return_code: u8,
    },
    /// Unsubscribe acknowledgment.
    UnsubAck(u16),
    /// Received a publish message.
    Message {
        /// Topic the message was published to.
        topic: String,
        /// Message payload.
        payload: Bytes,
    },
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}
