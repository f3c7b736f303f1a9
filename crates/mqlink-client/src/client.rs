//! MQTT client implementation.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::{bounded, Sender};
use log::{debug, info, warn};
use mqlink_core::{
    encode_publish, encode_subscribe, encode_unsubscribe, Publish, QoS, Subscribe, Unsubscribe,
};
use parking_lot::Mutex;

use crate::callback::{CallbackRegistry, MqttHandler};
use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, ConnectOptions};
use crate::connection::Connection;
use crate::error::{ClientError, Result};
use crate::events::ConnectionState;
use crate::packet_id::PacketIdAllocator;
use crate::transport::{Connector, TcpConnector};

/// MQTT client.
///
/// Cloning is cheap and every clone drives the same connection, so a
/// handler can capture a clone and publish from inside a callback.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    callbacks: Arc<CallbackRegistry>,
    packet_ids: Mutex<PacketIdAllocator>,
    state: Arc<AtomicU8>,
    session: Mutex<Option<Session>>,
}

/// A running connect loop, from `connect` until `disconnect`.
struct Session {
    connection: Arc<Connection>,
    stop: Sender<()>,
    manager: JoinHandle<()>,
}

impl Client {
    /// Create a client that connects over TCP (or TLS if configured).
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }

    /// Create a client with a custom transport connector.
    pub fn with_connector(config: ClientConfig, connector: impl Connector + 'static) -> Self {
        Self::with_parts(config, Arc::new(connector), Arc::new(SystemClock))
    }

    /// Create a client with a custom connector and clock.
    pub fn with_parts(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                clock,
                callbacks: Arc::new(CallbackRegistry::new()),
                packet_ids: Mutex::new(PacketIdAllocator::new()),
                state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
                session: Mutex::new(None),
            }),
        }
    }

    /// Start the background connect loop.
    ///
    /// Returns as soon as the loop is running; the `connected` handler
    /// reports when the broker accepts. `options` override the matching
    /// fields of the client config for this session.
    pub fn connect(&self, options: Option<ConnectOptions>) -> Result<()> {
        let mut session = self.inner.session.lock();
        if session.is_some() {
            return Err(ClientError::InvalidState(
                "Connect loop already running".to_string(),
            ));
        }

        let config = match options {
            Some(options) => self.inner.config.apply(options),
            None => self.inner.config.clone(),
        };
        config.validate()?;

        let address = config.address();
        let connection = Arc::new(Connection::new(
            config,
            self.inner.connector.clone(),
            self.inner.clock.clone(),
            self.inner.callbacks.clone(),
            self.inner.state.clone(),
        ));

        let (stop_tx, stop_rx) = bounded(1);
        let manager = {
            let connection = connection.clone();
            thread::Builder::new()
                .name("mqlink-manager".to_string())
                .spawn(move || connection.run(stop_rx))?
        };

        info!("MQTT client started for {}", address);
        *session = Some(Session {
            connection,
            stop: stop_tx,
            manager,
        });
        Ok(())
    }

    /// Stop the connect loop, send DISCONNECT if connected and release the
    /// transport. Calling it again is a no-op.
    pub fn disconnect(&self) -> Result<()> {
        let Some(session) = self.inner.session.lock().take() else {
            return Ok(());
        };

        let _ = session.stop.try_send(());
        let in_flight = session.connection.close();

        // A blocked handshake can hold the manager for a full connect
        // timeout; it exits on its own once the attempt returns. From a
        // `connected` handler we are on the manager thread itself.
        let detach = in_flight || session.manager.thread().id() == thread::current().id();
        if detach {
            debug!("Not waiting for the connection manager to exit");
        } else if session.manager.join().is_err() {
            warn!("Connection manager thread panicked");
        }

        info!("MQTT client stopped for {}", session.connection.config().address());
        Ok(())
    }

    /// Whether the broker connection is currently up. Never blocks.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current connection state. Never blocks.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Publish a message.
    ///
    /// Returns the packet identifier for QoS 1, `None` for QoS 0. The PUBACK
    /// is reported through the `puback` handler.
    pub fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<Option<u16>> {
        check_qos(qos)?;
        check_topic(topic)?;
        if topic.contains(['+', '#']) {
            // MQTT-3.3.2-2: topic names in PUBLISH must not contain wildcards
            return Err(ClientError::InvalidInput(format!(
                "Publish topic must not contain wildcards: {}",
                topic
            )));
        }

        let packet_id = match qos {
            QoS::AtMostOnce => None,
            _ => Some(self.next_packet_id()),
        };

        let publish = Publish {
            dup: false,
            qos,
            retain,
            topic: topic.to_string(),
            packet_id,
            payload: Bytes::copy_from_slice(payload),
        };

        let result = encode(|buf| encode_publish(&publish, buf)).and_then(|frame| self.send(&frame));
        result.map_err(|source| ClientError::Publish {
            topic: topic.to_string(),
            source: Box::new(source),
        })?;

        debug!(
            "Published {} bytes to '{}' (qos={:?}, packet_id={:?})",
            payload.len(),
            topic,
            qos,
            packet_id
        );
        Ok(packet_id)
    }

    /// Subscribe to a topic filter. Returns the packet identifier echoed by
    /// the SUBACK.
    pub fn subscribe(&self, topic: &str, qos: QoS) -> Result<u16> {
        check_qos(qos)?;
        check_topic(topic)?;

        let subscribe = Subscribe {
            packet_id: self.next_packet_id(),
            topic: topic.to_string(),
            qos,
        };

        let result =
            encode(|buf| encode_subscribe(&subscribe, buf)).and_then(|frame| self.send(&frame));
        result.map_err(|source| ClientError::Subscribe {
            topic: topic.to_string(),
            source: Box::new(source),
        })?;

        debug!(
            "Subscribed to '{}' (qos={:?}, packet_id={})",
            topic, qos, subscribe.packet_id
        );
        Ok(subscribe.packet_id)
    }

    /// Unsubscribe from a topic filter. Returns the packet identifier echoed
    /// by the UNSUBACK.
    pub fn unsubscribe(&self, topic: &str) -> Result<u16> {
        check_topic(topic)?;

        let unsubscribe = Unsubscribe {
            packet_id: self.next_packet_id(),
            topic: topic.to_string(),
        };

        let result = encode(|buf| encode_unsubscribe(&unsubscribe, buf))
            .and_then(|frame| self.send(&frame));
        result.map_err(|source| ClientError::Unsubscribe {
            topic: topic.to_string(),
            source: Box::new(source),
        })?;

        debug!(
            "Unsubscribed from '{}' (packet_id={})",
            topic, unsubscribe.packet_id
        );
        Ok(unsubscribe.packet_id)
    }

    /// Handler for connection up (`true`) and loss of an established connection (`false`).
    pub fn on_connected<F>(&self, f: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_connected(f);
    }

    /// Handler for PUBACK of a QoS 1 publish.
    pub fn on_puback<F>(&self, f: F)
    where
        F: Fn(u16) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_puback(f);
    }

    /// Handler for SUBACK: packet id and granted QoS (0x80 = refused).
    pub fn on_suback<F>(&self, f: F)
    where
        F: Fn(u16, u8) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_suback(f);
    }

    /// Handler for UNSUBACK.
    pub fn on_unsuback<F>(&self, f: F)
    where
        F: Fn(u16) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_unsuback(f);
    }

    /// Handler for inbound messages.
    pub fn on_message<F>(&self, f: F)
    where
        F: Fn(&str, &Bytes) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_message(f);
    }

    /// Route every event kind to one handler object.
    pub fn set_handler<H: MqttHandler + 'static>(&self, handler: Arc<H>) {
        self.inner.callbacks.set_handler(handler);
    }

    /// Remove all handlers.
    pub fn clear_handlers(&self) {
        self.inner.callbacks.clear();
    }

    /// The config given at construction (before any `ConnectOptions`).
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // === Internal methods ===

    fn next_packet_id(&self) -> u16 {
        self.inner.packet_ids.lock().allocate()
    }

    fn send(&self, frame: &[u8]) -> Result<()> {
        let connection = self
            .inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.connection.clone())
            .ok_or(ClientError::NotConnected)?;
        connection.send(frame)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            // Not joined: the last handle may be dropped on the manager thread
            let _ = session.stop.try_send(());
            session.connection.close();
        }
    }
}

fn encode<F>(f: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut Vec<u8>) -> mqlink_core::Result<()>,
{
    let mut frame = Vec::new();
    f(&mut frame)?;
    Ok(frame)
}

fn check_qos(qos: QoS) -> Result<()> {
    if qos == QoS::ExactlyOnce {
        return Err(ClientError::InvalidQoS(qos as u8));
    }
    Ok(())
}

fn check_topic(topic: &str) -> Result<()> {
    // MQTT-4.7.3-1: topic names and filters are at least one character long
    if topic.is_empty() {
        return Err(ClientError::InvalidInput("Topic must not be empty".to_string()));
    }
    // MQTT-1.5.3-2: no U+0000 in UTF-8 strings
    if topic.contains('\0') {
        return Err(ClientError::InvalidInput(
            "Topic must not contain a null character".to_string(),
        ));
    }
    Ok(())
}
