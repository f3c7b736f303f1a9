//! mqlink-core - MQTT 3.1.1 packet codec.
//!
//! This crate holds the wire-format side of the mqlink client: the
//! remaining-length varint, length-prefixed strings, and the encoders and
//! decoders for the packets a client sends and receives. It performs no I/O.

pub mod error;
pub mod packet;
pub mod varint;

pub use error::{ProtocolError, Result};
pub use packet::*;
