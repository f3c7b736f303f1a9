//! Remaining Length encoding/decoding for MQTT.
//!
//! The fixed header of every MQTT packet carries the length of the rest of
//! the packet as a variable-length integer: 7 value bits per byte, with the
//! high bit set on every byte except the last. At most four bytes are used:
//! - 0-127: 1 byte
//! - 128-16383: 2 bytes
//! - 16384-2097151: 3 bytes
//! - 2097152-268435455: 4 bytes

use crate::error::{ProtocolError, Result};

/// Largest value a remaining length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Maximum number of bytes in an encoded remaining length.
pub const MAX_ENCODED_LEN: usize = 4;

/// Decode a remaining length from the start of a buffer.
///
/// Returns `Ok(Some((value, bytes_consumed)))` if successful,
/// `Ok(None)` if more data is needed, or `Err` if the encoding runs past
/// four bytes.
///
/// # Example
/// ```
/// use mqlink_core::varint::decode;
/// let buf = [0x80, 0x01]; // Encodes 128
/// let (value, consumed) = decode(&buf).unwrap().unwrap();
/// assert_eq!(value, 128);
/// assert_eq!(consumed, 2);
/// ```
pub fn decode(buf: &[u8]) -> Result<Option<(usize, usize)>> {
    let mut value = 0usize;
    let mut shift = 0u32;

    for (i, &byte) in buf.iter().enumerate() {
        value |= ((byte & 0x7F) as usize) << shift;

        if (byte & 0x80) == 0 {
            return Ok(Some((value, i + 1)));
        }

        if i + 1 == MAX_ENCODED_LEN {
            return Err(ProtocolError::InvalidRemainingLength);
        }

        shift += 7;
    }

    // Need more bytes
    Ok(None)
}

/// Encode a remaining length, appending to a Vec.
///
/// Returns the number of bytes written. Values above
/// [`MAX_REMAINING_LENGTH`] cannot be represented.
///
/// # Example
/// ```
/// use mqlink_core::varint::encode;
/// let mut buf = Vec::new();
/// let written = encode(300, &mut buf).unwrap();
/// assert_eq!(written, 2);
/// assert_eq!(&buf, &[0xAC, 0x02]);
/// ```
pub fn encode(mut value: usize, buf: &mut Vec<u8>) -> Result<usize> {
    if value > MAX_REMAINING_LENGTH {
        return Err(ProtocolError::PacketTooLarge {
            size: value,
            max: MAX_REMAINING_LENGTH,
        });
    }

    let start = buf.len();
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
    Ok(buf.len() - start)
}

/// Calculate the number of bytes needed to encode a value.
///
/// # Example
/// ```
/// use mqlink_core::varint::encoded_len;
/// assert_eq!(encoded_len(0), 1);
/// assert_eq!(encoded_len(127), 1);
/// assert_eq!(encoded_len(128), 2);
/// assert_eq!(encoded_len(16383), 2);
/// assert_eq!(encoded_len(16384), 3);
/// ```
pub fn encoded_len(mut value: usize) -> usize {
    let mut len = 0;
    loop {
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    len
}
