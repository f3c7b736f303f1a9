//! Connection manager.
//!
//! Owns the transport and the connection state. The manager thread calls
//! [`Connection::tick`] once a second: while disconnected it makes a connect
//! attempt whenever the retry interval has passed, while connected it keeps
//! the link alive with PINGREQ. The reader thread and the public API only
//! reach the transport through `read`, `send` and `teardown` here, so every
//! state transition happens under the one link lock.
//!
//! Handlers are never called while the link lock is held.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, trace, warn};
use mqlink_core::{decode_connack, encode_connect, encode_disconnect, encode_pingreq, Connect};
use parking_lot::{Mutex, MutexGuard};

use crate::callback::CallbackRegistry;
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, ConnectionState};
use crate::reader;
use crate::transport::{Connector, Transport};

/// Cadence of the manager loop.
pub(crate) const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Read deadline on an established connection; bounds reader shutdown latency.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Unanswered pings tolerated before the link is declared dead.
const MAX_PENDING_PINGS: u8 = 2;

/// Result of one bounded read on the reader thread.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    Data(usize),
    Idle,
    Stopped,
}

struct Link {
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    /// Bumped for every installed transport.
    epoch: u64,
    last_attempt: Option<Instant>,
    last_send: Instant,
    pending_pings: u8,
    reader_running: Option<Arc<AtomicBool>>,
    /// Set by `close`; no further attempts are made.
    closed: bool,
}

pub(crate) struct Connection {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    callbacks: Arc<CallbackRegistry>,
    link: Mutex<Link>,
    /// Mirror of `link.state` for lock-free reads.
    state: Arc<AtomicU8>,
}

impl Connection {
    pub(crate) fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
        callbacks: Arc<CallbackRegistry>,
        state: Arc<AtomicU8>,
    ) -> Self {
        let now = clock.now();
        state.store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
        Self {
            config,
            connector,
            clock,
            callbacks,
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                transport: None,
                epoch: 0,
                last_attempt: None,
                last_send: now,
                pending_pings: 0,
                reader_running: None,
                closed: false,
            }),
            state,
        }
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn dispatch(&self, event: ClientEvent) {
        self.callbacks.dispatch(event);
    }

    fn set_state(&self, link: &mut Link, state: ConnectionState) {
        link.state = state;
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Manager loop. Ticks immediately, then once per [`TICK_INTERVAL`]
    /// until `stop` fires or its sender is dropped.
    pub(crate) fn run(self: Arc<Self>, stop: Receiver<()>) {
        debug!("Connection manager started for {}", self.config.address());
        loop {
            self.tick();
            match stop.recv_timeout(TICK_INTERVAL) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Connection manager stopped for {}", self.config.address());
    }

    /// One iteration of the connect/keep-alive policy.
    pub(crate) fn tick(self: &Arc<Self>) {
        let now = self.clock.now();
        match self.state() {
            ConnectionState::Disconnected => {
                if self.begin_attempt(now) {
                    self.attempt();
                }
            }
            ConnectionState::Connected => self.keep_alive(now),
            ConnectionState::Connecting => {}
        }
    }

    fn begin_attempt(&self, now: Instant) -> bool {
        let mut link = self.link.lock();
        if link.closed || link.state != ConnectionState::Disconnected {
            return false;
        }
        let due = match link.last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.config.retry_interval,
        };
        if due {
            link.last_attempt = Some(now);
            self.set_state(&mut link, ConnectionState::Connecting);
        }
        due
    }

    fn attempt(self: &Arc<Self>) {
        let address = self.config.address();
        info!("Connecting to MQTT broker at {}", address);

        match self.handshake() {
            Ok(transport) => self.install(transport),
            Err(e) => {
                match e {
                    ClientError::ConnectionRefused(code) => {
                        warn!("Connection to {} refused: {}", address, code)
                    }
                    _ => debug!("Connection attempt to {} failed: {}", address, e),
                }
                let mut link = self.link.lock();
                if link.state == ConnectionState::Connecting {
                    self.set_state(&mut link, ConnectionState::Disconnected);
                }
            }
        }
    }

    /// Open the transport, send CONNECT and wait for the 4-byte CONNACK.
    /// Runs without the link lock.
    fn handshake(&self) -> Result<Box<dyn Transport>> {
        let mut transport = self.connector.connect(&self.config)?;
        transport.set_read_timeout(Some(self.config.connect_timeout))?;

        let mut frame = Vec::new();
        encode_connect(&self.connect_packet(), &mut frame)?;
        transport.write_all(&frame)?;
        transport.flush()?;

        let mut response = [0u8; 4];
        transport.read_exact(&mut response)?;
        let connack = decode_connack(&response)?;

        if !connack.code.is_accepted() {
            let _ = transport.shutdown();
            return Err(ClientError::ConnectionRefused(connack.code));
        }

        debug!(
            "CONNACK accepted (session_present={})",
            connack.session_present
        );
        Ok(transport)
    }

    fn connect_packet(&self) -> Connect {
        Connect {
            clean_session: self.config.clean_session,
            keep_alive: self.config.keep_alive,
            client_id: self.config.client_id.clone(),
            will: self.config.will.as_ref().map(|w| w.to_packet()),
            username: self.config.username.clone(),
            password: self.config.password.clone().map(Bytes::from),
        }
    }

    fn install(self: &Arc<Self>, mut transport: Box<dyn Transport>) {
        let mut link = self.link.lock();

        if link.closed || link.state != ConnectionState::Connecting {
            // Closed while the handshake was in flight
            debug!("Discarding connection to {}: closed during handshake", self.config.address());
            let _ = transport.shutdown();
            return;
        }

        if let Err(e) = transport.set_read_timeout(Some(READ_TIMEOUT)) {
            debug!("Failed to set read timeout: {}", e);
            let _ = transport.shutdown();
            self.set_state(&mut link, ConnectionState::Disconnected);
            return;
        }

        let epoch = link.epoch + 1;
        let running = Arc::new(AtomicBool::new(true));

        // The reader blocks on the link lock until this function releases it
        if let Err(e) = reader::spawn(self.clone(), epoch, running.clone()) {
            warn!("Failed to start reader thread: {}", e);
            let _ = transport.shutdown();
            self.set_state(&mut link, ConnectionState::Disconnected);
            return;
        }

        link.epoch = epoch;
        link.transport = Some(transport);
        link.last_send = self.clock.now();
        link.pending_pings = 0;
        link.reader_running = Some(running);
        self.set_state(&mut link, ConnectionState::Connected);
        drop(link);

        info!("Connected to MQTT broker at {}", self.config.address());
        self.dispatch(ClientEvent::Connected(true));
    }

    fn keep_alive(&self, now: Instant) {
        if self.config.keep_alive == 0 {
            return;
        }
        let interval = Duration::from_secs(u64::from(self.config.keep_alive));

        let mut link = self.link.lock();
        if link.state != ConnectionState::Connected
            || now.saturating_duration_since(link.last_send) < interval
        {
            return;
        }

        if link.pending_pings >= MAX_PENDING_PINGS {
            warn!(
                "No PINGRESP after {} pings, closing connection to {}",
                link.pending_pings,
                self.config.address()
            );
            self.close_locked(link);
            return;
        }

        let mut frame = Vec::with_capacity(2);
        encode_pingreq(&mut frame);
        trace!("Sending PINGREQ");

        match self.write_frame(&mut link, &frame) {
            Ok(()) => link.pending_pings += 1,
            Err(e) => {
                warn!("Keep-alive ping failed: {}", e);
                self.close_locked(link);
            }
        }
    }

    /// Write one whole frame. Fails with `NotConnected` unless connected;
    /// a write error tears the connection down before it is returned.
    pub(crate) fn send(&self, frame: &[u8]) -> Result<()> {
        let mut link = self.link.lock();
        if link.state != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }

        match self.write_frame(&mut link, frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Send to {} failed, closing connection: {}", self.config.address(), e);
                self.close_locked(link);
                Err(ClientError::Io(e))
            }
        }
    }

    fn write_frame(&self, link: &mut Link, frame: &[u8]) -> io::Result<()> {
        let transport = link
            .transport
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no transport"))?;
        transport.write_all(frame)?;
        transport.flush()?;
        link.last_send = self.clock.now();
        Ok(())
    }

    /// Read whatever arrives within the read deadline.
    pub(crate) fn read(&self, running: &AtomicBool, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let mut link = self.link.lock();
        if !running.load(Ordering::SeqCst) {
            return Ok(ReadOutcome::Stopped);
        }
        let Some(transport) = link.transport.as_mut() else {
            return Ok(ReadOutcome::Stopped);
        };

        let outcome = match transport.read(buf) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by broker",
            )),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(ReadOutcome::Idle)
            }
            Err(e) => Err(e),
        };

        // Hand the lock to a waiting writer instead of racing it on the next read
        MutexGuard::unlock_fair(link);
        outcome
    }

    pub(crate) fn ping_answered(&self) {
        self.link.lock().pending_pings = 0;
    }

    /// Tear down the connection identified by `epoch`. Requests from an
    /// older connection are ignored.
    pub(crate) fn teardown(&self, epoch: u64, reason: &dyn fmt::Display) {
        let link = self.link.lock();
        if link.epoch != epoch || link.transport.is_none() {
            debug!("Ignoring teardown of stale connection {}: {}", epoch, reason);
            return;
        }
        warn!("Connection to {} lost: {}", self.config.address(), reason);
        self.close_locked(link);
    }

    /// Send DISCONNECT if connected, then release the transport. No attempt
    /// starts afterwards.
    ///
    /// Returns `true` if a handshake was in flight. That attempt finishes on
    /// the manager thread and its transport is discarded.
    pub(crate) fn close(&self) -> bool {
        let mut link = self.link.lock();
        link.closed = true;
        let in_flight = link.state == ConnectionState::Connecting;
        if link.state == ConnectionState::Connected {
            let mut frame = Vec::with_capacity(2);
            encode_disconnect(&mut frame);
            if let Err(e) = self.write_frame(&mut link, &frame) {
                debug!("Failed to send DISCONNECT: {}", e);
            }
        }
        self.close_locked(link);
        in_flight
    }

    /// Stop the reader, release the transport and fire `connected(false)`
    /// if the link was up. Consumes the guard so the handler runs unlocked.
    fn close_locked(&self, mut link: MutexGuard<'_, Link>) {
        if let Some(running) = link.reader_running.take() {
            running.store(false, Ordering::SeqCst);
        }
        if let Some(mut transport) = link.transport.take() {
            if let Err(e) = transport.shutdown() {
                debug!("Error shutting down transport: {}", e);
            }
        }
        link.pending_pings = 0;
        let was_connected = link.state == ConnectionState::Connected;
        self.set_state(&mut link, ConnectionState::Disconnected);
        drop(link);

        if was_connected {
            info!("Disconnected from MQTT broker at {}", self.config.address());
            self.dispatch(ClientEvent::Connected(false));
        }
    }

    #[cfg(test)]
    fn epoch(&self) -> u64 {
        self.link.lock().epoch
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use super::*;
    use crate::testing::{wait_until, ManualClock, MockConnector, Plan};

    const WAIT: Duration = Duration::from_secs(2);

    struct Harness {
        connection: Arc<Connection>,
        connector: MockConnector,
        clock: Arc<ManualClock>,
        ups: Arc<AtomicUsize>,
        downs: Arc<AtomicUsize>,
    }

    fn harness(config: ClientConfig, connector: MockConnector) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let callbacks = Arc::new(CallbackRegistry::new());
        let ups = Arc::new(AtomicUsize::new(0));
        let downs = Arc::new(AtomicUsize::new(0));
        let (u, d) = (ups.clone(), downs.clone());
        callbacks.on_connected(move |connected| {
            if connected {
                u.fetch_add(1, Ordering::SeqCst);
            } else {
                d.fetch_add(1, Ordering::SeqCst);
            }
        });
        let connection = Arc::new(Connection::new(
            config,
            Arc::new(connector.clone()),
            clock.clone(),
            callbacks,
            Arc::new(AtomicU8::new(0)),
        ));
        Harness {
            connection,
            connector,
            clock,
            ups,
            downs,
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("broker", 1883)
            .client_id("c")
            .keep_alive(5)
            .retry_interval(Duration::from_secs(10))
            .connect_timeout(Duration::from_millis(100))
    }

    #[test]
    fn test_retry_interval_gates_attempts() {
        let h = harness(config(), MockConnector::new(Plan::Connack(5)));

        let mut attempt_times = Vec::new();
        for second in 0..=25 {
            let before = h.connector.attempts();
            h.connection.tick();
            if h.connector.attempts() > before {
                attempt_times.push(second);
            }
            h.clock.advance(Duration::from_secs(1));
        }

        assert_eq!(attempt_times, vec![0, 10, 20]);
        assert_eq!(h.ups.load(Ordering::SeqCst), 0);
        assert_eq!(h.downs.load(Ordering::SeqCst), 0);
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_unreachable_broker_retries_without_callbacks() {
        let h = harness(config(), MockConnector::new(Plan::Unreachable));
        h.connection.tick();
        h.clock.advance(Duration::from_secs(9));
        h.connection.tick();
        assert_eq!(h.connector.attempts(), 1);
        h.clock.advance(Duration::from_secs(1));
        h.connection.tick();
        assert_eq!(h.connector.attempts(), 2);
        assert_eq!(h.ups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_connack_fails_attempt() {
        let h = harness(config(), MockConnector::new(Plan::NoResponse));
        h.connection.tick();
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.ups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_connack_fails_attempt() {
        let h = harness(
            config(),
            MockConnector::new(Plan::Respond(vec![0x20, 0x03, 0x00, 0x00])),
        );
        h.connection.tick();
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.connector.attempts(), 1);
        assert_eq!(h.ups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_accepted_connack_connects() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();

        assert_eq!(h.connection.state(), ConnectionState::Connected);
        assert_eq!(h.ups.load(Ordering::SeqCst), 1);
        assert_eq!(h.connection.epoch(), 1);

        let transport = h.connector.last_transport().unwrap();
        let sent = transport.written();
        // CONNECT with clean session, keep-alive 5, client id "c"
        assert_eq!(
            sent,
            vec![0x10, 13, 0, 4, b'M', b'Q', b'T', b'T', 4, 0x02, 0, 5, 0, 1, b'c']
        );

        // Further ticks do not reconnect
        h.connection.tick();
        assert_eq!(h.connector.attempts(), 1);

        h.connection.close();
    }

    #[test]
    fn test_keep_alive_pings_then_gives_up() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let transport = h.connector.last_transport().unwrap();
        transport.clear_written();

        h.clock.advance(Duration::from_secs(4));
        h.connection.tick();
        assert!(transport.written().is_empty());

        h.clock.advance(Duration::from_secs(1));
        h.connection.tick();
        assert_eq!(transport.written(), vec![0xC0, 0x00]);

        h.clock.advance(Duration::from_secs(5));
        h.connection.tick();
        assert_eq!(transport.written(), vec![0xC0, 0x00, 0xC0, 0x00]);

        // Two pings outstanding: the link is considered dead
        h.clock.advance(Duration::from_secs(5));
        h.connection.tick();
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);
        assert!(transport.is_shut_down());
    }

    #[test]
    fn test_pingresp_resets_pending_pings() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let transport = h.connector.last_transport().unwrap();

        for _ in 0..4 {
            h.clock.advance(Duration::from_secs(5));
            h.connection.tick();
            transport.push_inbound(&[0xD0, 0x00]);
            assert!(wait_until(WAIT, || h.connection.link.lock().pending_pings == 0));
        }
        assert_eq!(h.connection.state(), ConnectionState::Connected);
        h.connection.close();
    }

    #[test]
    fn test_keep_alive_zero_never_pings() {
        let h = harness(config().keep_alive(0), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let transport = h.connector.last_transport().unwrap();
        transport.clear_written();

        h.clock.advance(Duration::from_secs(3600));
        h.connection.tick();
        assert!(transport.written().is_empty());
        h.connection.close();
    }

    #[test]
    fn test_send_failure_tears_down() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let transport = h.connector.last_transport().unwrap();
        transport.fail_writes(true);

        let result = h.connection.send(&[0xC0, 0x00]);
        assert!(matches!(result, Err(ClientError::Io(_))));
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);

        assert!(matches!(
            h.connection.send(&[0xC0, 0x00]),
            Err(ClientError::NotConnected)
        ));
    }

    #[test]
    fn test_stale_teardown_is_ignored() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        h.connection.teardown(0, &"old reader");
        assert_eq!(h.connection.state(), ConnectionState::Connected);
        assert_eq!(h.downs.load(Ordering::SeqCst), 0);

        h.connection.teardown(1, &"current reader");
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);

        // A second request for the same connection is a no-op
        h.connection.teardown(1, &"current reader");
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reconnect_after_loss_uses_new_epoch() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let first = h.connector.last_transport().unwrap();
        first.close_remote();

        assert!(wait_until(WAIT, || h.connection.state()
            == ConnectionState::Disconnected));
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);

        h.clock.advance(Duration::from_secs(10));
        h.connection.tick();
        assert_eq!(h.connection.state(), ConnectionState::Connected);
        assert_eq!(h.connection.epoch(), 2);
        assert_eq!(h.ups.load(Ordering::SeqCst), 2);
        h.connection.close();
    }

    #[test]
    fn test_close_sends_disconnect() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let transport = h.connector.last_transport().unwrap();
        transport.clear_written();

        h.connection.close();
        assert_eq!(transport.written(), vec![0xE0, 0x00]);
        assert!(transport.is_shut_down());
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);

        // Idempotent
        h.connection.close();
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_stops_further_attempts() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        assert!(!h.connection.close());

        h.connection.tick();
        h.clock.advance(Duration::from_secs(10));
        h.connection.tick();
        assert_eq!(h.connector.attempts(), 0);
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_close_during_handshake_discards_transport() {
        let h = harness(
            config().connect_timeout(Duration::from_secs(2)),
            MockConnector::new(Plan::NoResponse),
        );
        let connection = h.connection.clone();
        let manager = thread::spawn(move || connection.tick());

        assert!(wait_until(WAIT, || h.connector.last_transport().is_some()));
        assert!(h.connection.close());
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);

        // The broker answers after the close; the handshake completes but
        // the transport is not installed
        let transport = h.connector.last_transport().unwrap();
        transport.push_inbound(&[0x20, 0x02, 0x00, 0x00]);
        manager.join().unwrap();

        assert!(transport.is_shut_down());
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.ups.load(Ordering::SeqCst), 0);
        assert_eq!(h.downs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_connack_while_connected_tears_down() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let transport = h.connector.last_transport().unwrap();

        transport.push_inbound(&[0x20, 0x02, 0x00, 0x00]);
        assert!(wait_until(WAIT, || h.connection.state()
            == ConnectionState::Disconnected));
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);
        assert!(transport.is_shut_down());
    }

    #[test]
    fn test_malformed_frame_tears_down() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let transport = h.connector.last_transport().unwrap();

        // Packet type 0 is reserved
        transport.push_inbound(&[0x00, 0x00]);
        assert!(wait_until(WAIT, || h.connection.state()
            == ConnectionState::Disconnected));
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);
        assert!(transport.is_shut_down());
    }

    #[test]
    fn test_failed_ping_tears_down() {
        let h = harness(config(), MockConnector::new(Plan::Connack(0)));
        h.connection.tick();
        let transport = h.connector.last_transport().unwrap();
        transport.fail_writes(true);

        h.clock.advance(Duration::from_secs(5));
        h.connection.tick();
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.downs.load(Ordering::SeqCst), 1);
        assert!(transport.is_shut_down());
    }
}
