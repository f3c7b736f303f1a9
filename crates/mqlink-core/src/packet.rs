//! MQTT 3.1.1 packet types and codec for the client side of a connection.
//!
//! Outbound: CONNECT, PUBLISH, PUBACK, SUBSCRIBE, UNSUBSCRIBE, PINGREQ,
//! DISCONNECT. Inbound: CONNACK, PUBLISH, PUBACK, SUBACK, UNSUBACK, PINGRESP.

use std::fmt;

use bytes::Bytes;

use crate::error::{ProtocolError, Result};
use crate::varint;

/// Protocol name carried in CONNECT.
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// SUBACK return code signalling a rejected subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

/// MQTT Control Packet Types (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Puback = 4,
    Pubrec = 5,
    Pubrel = 6,
    Pubcomp = 7,
    Subscribe = 8,
    Suback = 9,
    Unsubscribe = 10,
    Unsuback = 11,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::Connack),
            3 => Ok(PacketType::Publish),
            4 => Ok(PacketType::Puback),
            5 => Ok(PacketType::Pubrec),
            6 => Ok(PacketType::Pubrel),
            7 => Ok(PacketType::Pubcomp),
            8 => Ok(PacketType::Subscribe),
            9 => Ok(PacketType::Suback),
            10 => Ok(PacketType::Unsubscribe),
            11 => Ok(PacketType::Unsuback),
            12 => Ok(PacketType::Pingreq),
            13 => Ok(PacketType::Pingresp),
            14 => Ok(PacketType::Disconnect),
            _ => Err(ProtocolError::InvalidPacketType(value)),
        }
    }
}

/// Quality of Service levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
#[allow(clippy::enum_variant_names)] // MQTT protocol names
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(ProtocolError::InvalidQoS(value)),
        }
    }
}

/// CONNACK return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnackCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUsernamePassword = 4,
    NotAuthorized = 5,
}

impl ConnackCode {
    pub fn is_accepted(self) -> bool {
        self == ConnackCode::Accepted
    }
}

impl TryFrom<u8> for ConnackCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(ConnackCode::Accepted),
            1 => Ok(ConnackCode::UnacceptableProtocolVersion),
            2 => Ok(ConnackCode::IdentifierRejected),
            3 => Ok(ConnackCode::ServerUnavailable),
            4 => Ok(ConnackCode::BadUsernamePassword),
            5 => Ok(ConnackCode::NotAuthorized),
            _ => Err(ProtocolError::InvalidConnack(format!(
                "unknown return code {}",
                value
            ))),
        }
    }
}

impl fmt::Display for ConnackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConnackCode::Accepted => "connection accepted",
            ConnackCode::UnacceptableProtocolVersion => "unacceptable protocol version",
            ConnackCode::IdentifierRejected => "client identifier rejected",
            ConnackCode::ServerUnavailable => "server unavailable",
            ConnackCode::BadUsernamePassword => "bad username or password",
            ConnackCode::NotAuthorized => "not authorized",
        };
        f.write_str(msg)
    }
}

/// Will message carried in CONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// CONNECT packet data.
#[derive(Debug, Clone)]
pub struct Connect {
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
}

/// CONNACK packet data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connack {
    pub session_present: bool,
    pub code: ConnackCode,
}

/// PUBLISH packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    pub packet_id: Option<u16>,
    pub payload: Bytes,
}

/// SUBSCRIBE packet data (single topic filter).
#[derive(Debug, Clone)]
pub struct Subscribe {
    pub packet_id: u16,
    pub topic: String,
    pub qos: QoS,
}

/// SUBACK packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suback {
    pub packet_id: u16,
    pub return_codes: Vec<u8>,
}

impl Suback {
    /// Granted QoS for the first (and, for this client, only) topic filter.
    pub fn granted_qos(&self) -> u8 {
        self.return_codes.first().copied().unwrap_or(SUBACK_FAILURE)
    }
}

/// UNSUBSCRIBE packet data (single topic filter).
#[derive(Debug, Clone)]
pub struct Unsubscribe {
    pub packet_id: u16,
    pub topic: String,
}

/// Packets a client receives from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connack(Connack),
    Publish(Publish),
    Puback { packet_id: u16 },
    Suback(Suback),
    Unsuback { packet_id: u16 },
    Pingresp,
}

/// Decoder for MQTT packet bodies.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.buf.len() {
            return Err(ProtocolError::IncompletePacket { needed: 1, have: 0 });
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(ProtocolError::IncompletePacket {
                needed: 2,
                have: self.remaining(),
            });
        }
        let val = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(val)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ProtocolError::IncompletePacket {
                needed: len,
                have: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        // MQTT-1.5.3-2: UTF-8 string MUST NOT contain null character U+0000
        if bytes.contains(&0u8) {
            return Err(ProtocolError::MalformedPacket(
                "UTF-8 string must not contain null character".into(),
            ));
        }
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// Try to decode one complete packet sent by a broker.
///
/// Returns `Ok(Some((packet, bytes_consumed)))` if a whole frame is
/// buffered, `Ok(None)` if more data is needed, or `Err` on protocol errors.
/// `max_packet_size` of 0 means no limit.
pub fn decode_packet(buf: &[u8], max_packet_size: usize) -> Result<Option<(Packet, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    let fixed_header = buf[0];

    let Some((remaining_len, len_bytes)) = varint::decode(&buf[1..])? else {
        return Ok(None);
    };

    let header_len = 1 + len_bytes;
    let total_len = header_len + remaining_len;

    if max_packet_size > 0 && total_len > max_packet_size {
        return Err(ProtocolError::PacketTooLarge {
            size: total_len,
            max: max_packet_size,
        });
    }

    if buf.len() < total_len {
        return Ok(None);
    }

    let packet_type = PacketType::try_from(fixed_header >> 4)?;
    let flags = fixed_header & 0x0F;
    let body = &buf[header_len..total_len];

    let packet = match packet_type {
        PacketType::Publish => Packet::Publish(decode_publish(flags, body)?),
        _ if flags != 0 => {
            return Err(ProtocolError::MalformedPacket(format!(
                "{:?} fixed header flags must be 0, got {:#04x}",
                packet_type, flags
            )))
        }
        PacketType::Connack => Packet::Connack(decode_connack_body(body)?),
        PacketType::Puback => Packet::Puback {
            packet_id: decode_packet_id(packet_type, body)?,
        },
        PacketType::Suback => Packet::Suback(decode_suback(body)?),
        PacketType::Unsuback => Packet::Unsuback {
            packet_id: decode_packet_id(packet_type, body)?,
        },
        PacketType::Pingresp => {
            if !body.is_empty() {
                return Err(ProtocolError::MalformedPacket(
                    "PINGRESP must have zero remaining length".into(),
                ));
            }
            Packet::Pingresp
        }
        other => return Err(ProtocolError::UnexpectedPacket(other)),
    };

    Ok(Some((packet, total_len)))
}

/// Decode the 4-byte CONNACK frame read during the connect handshake.
///
/// A refused connection decodes successfully; the caller inspects `code`.
pub fn decode_connack(frame: &[u8]) -> Result<Connack> {
    if frame.len() != 4 {
        return Err(ProtocolError::InvalidConnack(format!(
            "expected 4 bytes, got {}",
            frame.len()
        )));
    }
    if frame[0] != 0x20 {
        return Err(ProtocolError::InvalidConnack(format!(
            "unexpected header byte {:#04x}",
            frame[0]
        )));
    }
    if frame[1] != 0x02 {
        return Err(ProtocolError::InvalidConnack(format!(
            "unexpected remaining length {}",
            frame[1]
        )));
    }
    decode_connack_body(&frame[2..])
}

fn decode_connack_body(body: &[u8]) -> Result<Connack> {
    if body.len() != 2 {
        return Err(ProtocolError::InvalidConnack(format!(
            "expected 2 byte body, got {}",
            body.len()
        )));
    }
    // MQTT-3.2.2-1: bits 7-1 of the acknowledge flags are reserved
    if body[0] & 0xFE != 0 {
        return Err(ProtocolError::InvalidConnack(format!(
            "reserved acknowledge flags set: {:#04x}",
            body[0]
        )));
    }
    Ok(Connack {
        session_present: body[0] & 0x01 != 0,
        code: ConnackCode::try_from(body[1])?,
    })
}

fn decode_publish(flags: u8, body: &[u8]) -> Result<Publish> {
    let dup = (flags & 0x08) != 0;
    let qos = QoS::try_from((flags >> 1) & 0x03)?;
    let retain = (flags & 0x01) != 0;

    let mut dec = Decoder::new(body);

    let topic = dec.read_string()?;

    let packet_id = if qos != QoS::AtMostOnce {
        let id = dec.read_u16()?;
        if id == 0 {
            return Err(ProtocolError::MalformedPacket(
                "PUBLISH packet identifier must be non-zero".into(),
            ));
        }
        Some(id)
    } else {
        None
    };

    let payload = dec.read_bytes(dec.remaining())?;

    Ok(Publish {
        dup,
        qos,
        retain,
        topic,
        packet_id,
        payload: Bytes::copy_from_slice(payload),
    })
}

fn decode_packet_id(packet_type: PacketType, body: &[u8]) -> Result<u16> {
    if body.len() != 2 {
        return Err(ProtocolError::MalformedPacket(format!(
            "{:?} must have remaining length 2, got {}",
            packet_type,
            body.len()
        )));
    }
    Ok(u16::from_be_bytes([body[0], body[1]]))
}

fn decode_suback(body: &[u8]) -> Result<Suback> {
    let mut dec = Decoder::new(body);
    let packet_id = dec.read_u16()?;
    let return_codes = dec.read_bytes(dec.remaining())?.to_vec();

    if return_codes.is_empty() {
        return Err(ProtocolError::MalformedPacket(
            "SUBACK with no return codes".into(),
        ));
    }
    if let Some(code) = return_codes
        .iter()
        .find(|&&c| c > QoS::ExactlyOnce as u8 && c != SUBACK_FAILURE)
    {
        return Err(ProtocolError::MalformedPacket(format!(
            "Invalid SUBACK return code: {:#04x}",
            code
        )));
    }

    Ok(Suback {
        packet_id,
        return_codes,
    })
}

// === Client Packet Encoding ===

/// Encode a CONNECT packet.
///
/// Payload order is fixed: client id, will topic, will payload, username,
/// password, each present only when its flag is set.
pub fn encode_connect(connect: &Connect, buf: &mut Vec<u8>) -> Result<()> {
    let mut body = Vec::new();

    write_binary(PROTOCOL_NAME.as_bytes(), &mut body)?;
    body.push(PROTOCOL_LEVEL);
    body.push(connect_flags(connect));
    body.extend_from_slice(&connect.keep_alive.to_be_bytes());

    write_binary(connect.client_id.as_bytes(), &mut body)?;

    if let Some(ref will) = connect.will {
        write_binary(will.topic.as_bytes(), &mut body)?;
        write_binary(&will.payload, &mut body)?;
    }

    if let Some(ref username) = connect.username {
        write_binary(username.as_bytes(), &mut body)?;
    }

    if let Some(ref password) = connect.password {
        write_binary(password, &mut body)?;
    }

    write_fixed_header((PacketType::Connect as u8) << 4, body.len(), buf)?;
    buf.extend_from_slice(&body);
    Ok(())
}

fn connect_flags(connect: &Connect) -> u8 {
    let mut flags = 0u8;
    if connect.clean_session {
        flags |= 0x02;
    }
    if let Some(ref will) = connect.will {
        flags |= 0x04;
        flags |= (will.qos as u8) << 3;
        if will.retain {
            flags |= 0x20;
        }
    }
    if connect.password.is_some() {
        flags |= 0x40;
    }
    if connect.username.is_some() {
        flags |= 0x80;
    }
    flags
}

/// Encode a PUBLISH packet.
pub fn encode_publish(publish: &Publish, buf: &mut Vec<u8>) -> Result<()> {
    match (publish.qos, publish.packet_id) {
        (QoS::AtMostOnce, Some(_)) => {
            return Err(ProtocolError::MalformedPacket(
                "QoS 0 PUBLISH must not carry a packet identifier".into(),
            ))
        }
        (QoS::AtLeastOnce | QoS::ExactlyOnce, None | Some(0)) => {
            return Err(ProtocolError::MalformedPacket(
                "QoS > 0 PUBLISH requires a non-zero packet identifier".into(),
            ))
        }
        _ => {}
    }

    let mut header = (PacketType::Publish as u8) << 4;
    if publish.dup {
        header |= 0x08;
    }
    header |= (publish.qos as u8) << 1;
    if publish.retain {
        header |= 0x01;
    }

    let mut remaining = 2 + publish.topic.len() + publish.payload.len();
    if publish.packet_id.is_some() {
        remaining += 2;
    }

    write_fixed_header(header, remaining, buf)?;
    write_binary(publish.topic.as_bytes(), buf)?;
    if let Some(packet_id) = publish.packet_id {
        buf.extend_from_slice(&packet_id.to_be_bytes());
    }
    buf.extend_from_slice(&publish.payload);
    Ok(())
}

/// Encode a SUBSCRIBE packet.
pub fn encode_subscribe(subscribe: &Subscribe, buf: &mut Vec<u8>) -> Result<()> {
    // packet id + topic string + requested QoS byte
    let remaining = 2 + 2 + subscribe.topic.len() + 1;

    // MQTT-3.8.1-1: SUBSCRIBE fixed header flags MUST be 0010
    write_fixed_header(((PacketType::Subscribe as u8) << 4) | 0x02, remaining, buf)?;
    buf.extend_from_slice(&subscribe.packet_id.to_be_bytes());
    write_binary(subscribe.topic.as_bytes(), buf)?;
    buf.push(subscribe.qos as u8);
    Ok(())
}

/// Encode an UNSUBSCRIBE packet.
pub fn encode_unsubscribe(unsubscribe: &Unsubscribe, buf: &mut Vec<u8>) -> Result<()> {
    let remaining = 2 + 2 + unsubscribe.topic.len();

    // MQTT-3.10.1-1: UNSUBSCRIBE fixed header flags MUST be 0010
    write_fixed_header(
        ((PacketType::Unsubscribe as u8) << 4) | 0x02,
        remaining,
        buf,
    )?;
    buf.extend_from_slice(&unsubscribe.packet_id.to_be_bytes());
    write_binary(unsubscribe.topic.as_bytes(), buf)?;
    Ok(())
}

/// Encode a PUBACK acknowledging an inbound QoS 1 PUBLISH.
pub fn encode_puback(packet_id: u16, buf: &mut Vec<u8>) {
    buf.push((PacketType::Puback as u8) << 4);
    buf.push(2); // Remaining length
    buf.extend_from_slice(&packet_id.to_be_bytes());
}

/// Encode a PINGREQ packet.
pub fn encode_pingreq(buf: &mut Vec<u8>) {
    buf.push((PacketType::Pingreq as u8) << 4);
    buf.push(0);
}

/// Encode a DISCONNECT packet.
pub fn encode_disconnect(buf: &mut Vec<u8>) {
    buf.push((PacketType::Disconnect as u8) << 4);
    buf.push(0);
}

fn write_fixed_header(header: u8, remaining: usize, buf: &mut Vec<u8>) -> Result<()> {
    buf.push(header);
    varint::encode(remaining, buf)?;
    Ok(())
}

/// Write a 2-byte big-endian length followed by the bytes themselves.
fn write_binary(data: &[u8], buf: &mut Vec<u8>) -> Result<()> {
    let len = u16::try_from(data.len()).map_err(|_| ProtocolError::StringTooLong(data.len()))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(client_id: &str) -> Connect {
        Connect {
            clean_session: true,
            keep_alive: 60,
            client_id: client_id.to_string(),
            will: None,
            username: None,
            password: None,
        }
    }

    fn publish(topic: &str, payload: &[u8], qos: QoS, packet_id: Option<u16>) -> Publish {
        Publish {
            dup: false,
            qos,
            retain: false,
            topic: topic.to_string(),
            packet_id,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn test_encode_minimal_connect() {
        let mut buf = Vec::new();
        encode_connect(&connect("c"), &mut buf).unwrap();
        assert_eq!(
            buf,
            vec![
                0x10, 13, // fixed header
                0x00, 0x04, b'M', b'Q', b'T', b'T', // protocol name
                0x04, // level
                0x02, // clean session
                0x00, 60, // keep alive
                0x00, 0x01, b'c', // client id
            ]
        );
    }

    #[test]
    fn test_encode_connect_with_will_and_credentials() {
        let mut packet = connect("id");
        packet.will = Some(Will {
            topic: "w".to_string(),
            payload: Bytes::from_static(b"bye"),
            qos: QoS::AtLeastOnce,
            retain: true,
        });
        packet.username = Some("u".to_string());
        packet.password = Some(Bytes::from_static(b"pw"));

        let mut buf = Vec::new();
        encode_connect(&packet, &mut buf).unwrap();

        // clean | will | will qos 1 | will retain | password | username
        assert_eq!(buf[9], 0xEE);
        assert_eq!(buf[1] as usize, buf.len() - 2);
        assert_eq!(
            &buf[12..],
            &[
                0x00, 0x02, b'i', b'd', // client id
                0x00, 0x01, b'w', // will topic
                0x00, 0x03, b'b', b'y', b'e', // will payload
                0x00, 0x01, b'u', // username
                0x00, 0x02, b'p', b'w', // password
            ]
        );
    }

    #[test]
    fn test_encode_connect_username_without_password() {
        let mut packet = connect("id");
        packet.username = Some("u".to_string());
        let mut buf = Vec::new();
        encode_connect(&packet, &mut buf).unwrap();
        assert_eq!(buf[9], 0x82);
    }

    #[test]
    fn test_encode_publish_qos0() {
        let mut buf = Vec::new();
        encode_publish(&publish("a", b"b", QoS::AtMostOnce, None), &mut buf).unwrap();
        assert_eq!(buf, vec![0x30, 0x04, 0x00, 0x01, b'a', b'b']);
    }

    #[test]
    fn test_encode_publish_qos1_retain() {
        let mut packet = publish("t", b"x", QoS::AtLeastOnce, Some(258));
        packet.retain = true;
        let mut buf = Vec::new();
        encode_publish(&packet, &mut buf).unwrap();
        assert_eq!(buf, vec![0x33, 0x06, 0x00, 0x01, b't', 0x01, 0x02, b'x']);
    }

    #[test]
    fn test_encode_publish_rejects_bad_packet_id() {
        let mut buf = Vec::new();
        assert!(encode_publish(&publish("t", b"", QoS::AtLeastOnce, None), &mut buf).is_err());
        assert!(encode_publish(&publish("t", b"", QoS::AtLeastOnce, Some(0)), &mut buf).is_err());
        assert!(encode_publish(&publish("t", b"", QoS::AtMostOnce, Some(1)), &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_large_publish_uses_multibyte_length() {
        let payload = vec![0xAB; 200];
        let mut buf = Vec::new();
        encode_publish(&publish("t", &payload, QoS::AtMostOnce, None), &mut buf).unwrap();
        // 2 + 1 + 200 = 203 = 0xCB 0x01
        assert_eq!(&buf[..3], &[0x30, 0xCB, 0x01]);
        assert_eq!(buf.len(), 3 + 203);
    }

    #[test]
    fn test_publish_roundtrip_preserves_flags() {
        let mut original = publish("sensors/temp", b"\x00\x01binary\xff", QoS::AtLeastOnce, Some(7));
        original.retain = true;
        original.dup = true;

        let mut buf = Vec::new();
        encode_publish(&original, &mut buf).unwrap();

        let (packet, consumed) = decode_packet(&buf, 0).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(packet, Packet::Publish(original));
    }

    #[test]
    fn test_publish_roundtrip_empty_payload() {
        let original = publish("a/b", b"", QoS::AtMostOnce, None);
        let mut buf = Vec::new();
        encode_publish(&original, &mut buf).unwrap();
        let (packet, _) = decode_packet(&buf, 0).unwrap().unwrap();
        assert_eq!(packet, Packet::Publish(original));
    }

    #[test]
    fn test_encode_subscribe() {
        let mut buf = Vec::new();
        encode_subscribe(
            &Subscribe {
                packet_id: 1,
                topic: "t".to_string(),
                qos: QoS::AtLeastOnce,
            },
            &mut buf,
        )
        .unwrap();
        assert_eq!(buf, vec![0x82, 0x06, 0x00, 0x01, 0x00, 0x01, b't', 0x01]);
    }

    #[test]
    fn test_encode_unsubscribe() {
        let mut buf = Vec::new();
        encode_unsubscribe(
            &Unsubscribe {
                packet_id: 3,
                topic: "t".to_string(),
            },
            &mut buf,
        )
        .unwrap();
        assert_eq!(buf, vec![0xA2, 0x05, 0x00, 0x03, 0x00, 0x01, b't']);
    }

    #[test]
    fn test_encode_fixed_frames() {
        let mut buf = Vec::new();
        encode_pingreq(&mut buf);
        encode_disconnect(&mut buf);
        encode_puback(1, &mut buf);
        assert_eq!(buf, vec![0xC0, 0x00, 0xE0, 0x00, 0x40, 0x02, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_rejects_long_string() {
        let topic = "x".repeat(65536);
        let mut buf = Vec::new();
        let err = encode_publish(&publish(&topic, b"", QoS::AtMostOnce, None), &mut buf);
        assert_eq!(err, Err(ProtocolError::StringTooLong(65536)));
    }

    #[test]
    fn test_decode_connack() {
        let connack = decode_connack(&[0x20, 0x02, 0x00, 0x00]).unwrap();
        assert!(connack.code.is_accepted());
        assert!(!connack.session_present);

        let connack = decode_connack(&[0x20, 0x02, 0x01, 0x00]).unwrap();
        assert!(connack.session_present);
    }

    #[test]
    fn test_decode_connack_refusals() {
        let expected = [
            (1, ConnackCode::UnacceptableProtocolVersion),
            (2, ConnackCode::IdentifierRejected),
            (3, ConnackCode::ServerUnavailable),
            (4, ConnackCode::BadUsernamePassword),
            (5, ConnackCode::NotAuthorized),
        ];
        for (raw, code) in expected {
            let connack = decode_connack(&[0x20, 0x02, 0x00, raw]).unwrap();
            assert_eq!(connack.code, code);
            assert!(!connack.code.is_accepted());
        }
    }

    #[test]
    fn test_decode_connack_malformed() {
        assert!(decode_connack(&[0x21, 0x02, 0x00, 0x00]).is_err());
        assert!(decode_connack(&[0x20, 0x03, 0x00, 0x00]).is_err());
        assert!(decode_connack(&[0x20, 0x02, 0x00]).is_err());
        assert!(decode_connack(&[0x20, 0x02, 0x02, 0x00]).is_err());
        assert!(decode_connack(&[0x20, 0x02, 0x00, 0x06]).is_err());
    }

    #[test]
    fn test_decode_inbound_qos1_publish() {
        let buf = [0x32, 0x06, 0x00, 0x01, b't', 0x00, 0x01, b'x'];
        let (packet, consumed) = decode_packet(&buf, 0).unwrap().unwrap();
        assert_eq!(consumed, 8);
        match packet {
            Packet::Publish(publish) => {
                assert_eq!(publish.topic, "t");
                assert_eq!(publish.qos, QoS::AtLeastOnce);
                assert_eq!(publish.packet_id, Some(1));
                assert_eq!(publish.payload.as_ref(), b"x");
            }
            other => panic!("expected PUBLISH, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_acks() {
        assert_eq!(
            decode_packet(&[0x40, 0x02, 0x00, 0x09], 0).unwrap(),
            Some((Packet::Puback { packet_id: 9 }, 4))
        );
        assert_eq!(
            decode_packet(&[0x90, 0x03, 0x00, 0x05, 0x01], 0).unwrap(),
            Some((
                Packet::Suback(Suback {
                    packet_id: 5,
                    return_codes: vec![1],
                }),
                5
            ))
        );
        assert_eq!(
            decode_packet(&[0xB0, 0x02, 0x00, 0x07], 0).unwrap(),
            Some((Packet::Unsuback { packet_id: 7 }, 4))
        );
        assert_eq!(
            decode_packet(&[0xD0, 0x00], 0).unwrap(),
            Some((Packet::Pingresp, 2))
        );
    }

    #[test]
    fn test_suback_failure_code() {
        let (packet, _) = decode_packet(&[0x90, 0x03, 0x00, 0x05, 0x80], 0)
            .unwrap()
            .unwrap();
        let Packet::Suback(suback) = packet else {
            panic!("expected SUBACK");
        };
        assert_eq!(suback.granted_qos(), SUBACK_FAILURE);

        assert!(decode_packet(&[0x90, 0x03, 0x00, 0x05, 0x03], 0).is_err());
    }

    #[test]
    fn test_decode_incomplete_frames() {
        assert_eq!(decode_packet(&[], 0).unwrap(), None);
        assert_eq!(decode_packet(&[0x32], 0).unwrap(), None);
        assert_eq!(decode_packet(&[0x32, 0x06, 0x00, 0x01], 0).unwrap(), None);
        assert_eq!(decode_packet(&[0x30, 0x80], 0).unwrap(), None);
    }

    #[test]
    fn test_decode_consumes_one_frame_at_a_time() {
        let buf = [0xD0, 0x00, 0x40, 0x02, 0x00, 0x02];
        let (first, consumed) = decode_packet(&buf, 0).unwrap().unwrap();
        assert_eq!(first, Packet::Pingresp);
        let (second, _) = decode_packet(&buf[consumed..], 0).unwrap().unwrap();
        assert_eq!(second, Packet::Puback { packet_id: 2 });
    }

    #[test]
    fn test_decode_malformed() {
        // Topic length runs past the end of the frame
        assert!(decode_packet(&[0x30, 0x02, 0x00, 0x05], 0).is_err());
        // QoS 3
        assert_eq!(
            decode_packet(&[0x36, 0x03, 0x00, 0x01, b't'], 0),
            Err(ProtocolError::InvalidQoS(3))
        );
        // Reserved flags on PUBACK
        assert!(decode_packet(&[0x41, 0x02, 0x00, 0x01], 0).is_err());
        // PUBACK with wrong length
        assert!(decode_packet(&[0x40, 0x03, 0x00, 0x01, 0x00], 0).is_err());
        // Invalid UTF-8 topic
        assert_eq!(
            decode_packet(&[0x30, 0x03, 0x00, 0x01, 0xFF], 0),
            Err(ProtocolError::InvalidUtf8)
        );
        // Packet type 0 is reserved
        assert_eq!(
            decode_packet(&[0x00, 0x00], 0),
            Err(ProtocolError::InvalidPacketType(0))
        );
    }

    #[test]
    fn test_decode_rejects_client_only_packets() {
        assert_eq!(
            decode_packet(&[0xC0, 0x00], 0),
            Err(ProtocolError::UnexpectedPacket(PacketType::Pingreq))
        );
    }

    #[test]
    fn test_decode_enforces_max_packet_size() {
        let buf = [0x30, 0x04, 0x00, 0x01, b'a', b'b'];
        assert!(decode_packet(&buf, 6).unwrap().is_some());
        assert_eq!(
            decode_packet(&buf, 5),
            Err(ProtocolError::PacketTooLarge { size: 6, max: 5 })
        );
    }
}
