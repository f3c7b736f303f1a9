//! Reader loop: frames inbound bytes and dispatches packets.
//!
//! One reader thread runs per established connection. It stops when its
//! `running` flag is cleared by teardown, or tears the connection down
//! itself on EOF, I/O errors and malformed packets.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::{Buf, BytesMut};
use log::{debug, trace, warn};
use mqlink_core::{decode_packet, encode_puback, Packet, PacketType, ProtocolError, Publish, QoS};

use crate::connection::{Connection, ReadOutcome};
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;

const DEFAULT_BUFFER_SIZE: usize = 8192;

pub(crate) fn spawn(
    connection: Arc<Connection>,
    epoch: u64,
    running: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("mqlink-reader-{}", epoch))
        .spawn(move || run(&connection, epoch, &running))
}

fn run(connection: &Connection, epoch: u64, running: &AtomicBool) {
    debug!("Reader started for connection {}", epoch);

    let mut read_buf = BytesMut::with_capacity(DEFAULT_BUFFER_SIZE);
    let mut chunk = vec![0u8; DEFAULT_BUFFER_SIZE];

    while running.load(Ordering::SeqCst) {
        match connection.read(running, &mut chunk) {
            Ok(ReadOutcome::Data(n)) => read_buf.extend_from_slice(&chunk[..n]),
            Ok(ReadOutcome::Idle) => continue,
            Ok(ReadOutcome::Stopped) => break,
            Err(e) => {
                connection.teardown(epoch, &e);
                break;
            }
        }

        if let Err(e) = process_frames(connection, &mut read_buf) {
            connection.teardown(epoch, &e);
            break;
        }
    }

    debug!("Reader stopped for connection {}", epoch);
}

/// Decode and handle every complete frame in the buffer.
fn process_frames(connection: &Connection, read_buf: &mut BytesMut) -> Result<()> {
    let max_packet_size = connection.config().max_packet_size;
    while let Some((packet, consumed)) = decode_packet(&read_buf[..], max_packet_size)? {
        read_buf.advance(consumed);
        handle_packet(connection, packet)?;
    }
    Ok(())
}

fn handle_packet(connection: &Connection, packet: Packet) -> Result<()> {
    match packet {
        Packet::Pingresp => {
            trace!("Received PINGRESP");
            connection.ping_answered();
        }
        Packet::Puback { packet_id } => {
            debug!("Received PUBACK (packet_id={})", packet_id);
            connection.dispatch(ClientEvent::PubAck(packet_id));
        }
        Packet::Suback(suback) => {
            debug!(
                "Received SUBACK (packet_id={}, codes={:?})",
                suback.packet_id, suback.return_codes
            );
            connection.dispatch(ClientEvent::SubAck {
                packet_id: suback.packet_id,
                return_code: suback.granted_qos(),
            });
        }
        Packet::Unsuback { packet_id } => {
            debug!("Received UNSUBACK (packet_id={})", packet_id);
            connection.dispatch(ClientEvent::UnsubAck(packet_id));
        }
        Packet::Publish(publish) => handle_publish(connection, publish)?,
        Packet::Connack(_) => {
            return Err(ClientError::Protocol(ProtocolError::UnexpectedPacket(
                PacketType::Connack,
            )))
        }
    }
    Ok(())
}

fn handle_publish(connection: &Connection, publish: Publish) -> Result<()> {
    debug!(
        "Received PUBLISH on '{}' ({} bytes, {:?})",
        publish.topic,
        publish.payload.len(),
        publish.qos
    );

    match (publish.qos, publish.packet_id) {
        (QoS::AtLeastOnce, Some(packet_id)) => {
            // PUBACK goes out before the message handler runs
            let mut frame = Vec::with_capacity(4);
            encode_puback(packet_id, &mut frame);
            connection.send(&frame)?;
        }
        (QoS::ExactlyOnce, _) => {
            warn!(
                "QoS 2 PUBLISH on '{}' delivered without acknowledgement",
                publish.topic
            );
        }
        _ => {}
    }

    connection.dispatch(ClientEvent::Message {
        topic: publish.topic,
        payload: publish.payload,
    });
    Ok(())
}
