//! Test doubles for driving the client without a broker.
//!
//! Provides an in-memory transport, a scripted connector and a manually
//! advanced clock. Tests hold a [`MockHandle`] to feed broker bytes into a
//! connection and inspect what the client wrote.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::{Connector, Transport};

/// What the mock broker does when the client connects.
#[derive(Debug, Clone)]
pub enum Plan {
    /// The transport cannot be opened.
    Unreachable,
    /// Answer CONNECT with a CONNACK carrying this return code.
    Connack(u8),
    /// Answer CONNECT with these raw bytes.
    Respond(Vec<u8>),
    /// Accept the transport but never answer.
    NoResponse,
}

#[derive(Default)]
struct Pipe {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    remote_closed: bool,
    shut_down: bool,
    fail_writes: bool,
    read_timeout: Option<Duration>,
}

#[derive(Default)]
struct Shared {
    pipe: Mutex<Pipe>,
    ready: Condvar,
}

/// In-memory [`Transport`]. Reads honor the configured read timeout.
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Create a transport and the handle that controls its broker side.
    pub fn pair() -> (MockTransport, MockHandle) {
        let shared = Arc::new(Shared::default());
        (
            MockTransport {
                shared: shared.clone(),
            },
            MockHandle { shared },
        )
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.shared.pipe.lock();
        let deadline = pipe.read_timeout.map(|t| Instant::now() + t);

        while pipe.inbound.is_empty() && !pipe.remote_closed && !pipe.shut_down {
            match deadline {
                Some(deadline) => {
                    if self.shared.ready.wait_until(&mut pipe, deadline).timed_out() {
                        break;
                    }
                }
                None => self.shared.ready.wait(&mut pipe),
            }
        }

        if !pipe.inbound.is_empty() {
            let n = buf.len().min(pipe.inbound.len());
            for (slot, byte) in buf.iter_mut().zip(pipe.inbound.drain(..n)) {
                *slot = byte;
            }
            return Ok(n);
        }
        if pipe.remote_closed || pipe.shut_down {
            return Ok(0);
        }
        Err(io::Error::new(io::ErrorKind::WouldBlock, "read timed out"))
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut pipe = self.shared.pipe.lock();
        if pipe.shut_down || pipe.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        pipe.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.shared.pipe.lock().read_timeout = timeout;
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.shared.pipe.lock().shut_down = true;
        self.shared.ready.notify_all();
        Ok(())
    }
}

/// Broker-side control of a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockHandle {
    /// Queue bytes for the client to read.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.shared.pipe.lock().inbound.extend(bytes.iter().copied());
        self.shared.ready.notify_all();
    }

    /// Everything the client has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.shared.pipe.lock().outbound.clone()
    }

    pub fn clear_written(&self) {
        self.shared.pipe.lock().outbound.clear();
    }

    /// Simulate the broker closing the connection (reads return EOF).
    pub fn close_remote(&self) {
        self.shared.pipe.lock().remote_closed = true;
        self.shared.ready.notify_all();
    }

    /// Make subsequent writes fail with `BrokenPipe`.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.pipe.lock().fail_writes = fail;
    }

    /// Whether the client shut this transport down.
    pub fn is_shut_down(&self) -> bool {
        self.shared.pipe.lock().shut_down
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.shared.pipe.lock().read_timeout
    }
}

struct ConnectorState {
    plans: Mutex<VecDeque<Plan>>,
    fallback: Plan,
    attempts: AtomicUsize,
    transports: Mutex<Vec<MockHandle>>,
}

/// Scripted [`Connector`]. Queued plans are used first, then the fallback.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<ConnectorState>,
}

impl MockConnector {
    pub fn new(fallback: Plan) -> Self {
        Self {
            state: Arc::new(ConnectorState {
                plans: Mutex::new(VecDeque::new()),
                fallback,
                attempts: AtomicUsize::new(0),
                transports: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue a plan for the next attempt that has none yet.
    pub fn then(self, plan: Plan) -> Self {
        self.state.plans.lock().push_back(plan);
        self
    }

    /// Number of connect attempts made so far.
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Handles for every transport handed out, oldest first.
    pub fn transports(&self) -> Vec<MockHandle> {
        self.state.transports.lock().clone()
    }

    pub fn last_transport(&self) -> Option<MockHandle> {
        self.state.transports.lock().last().cloned()
    }
}

impl Connector for MockConnector {
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Transport>> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        let plan = self
            .state
            .plans
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.state.fallback.clone());

        let (transport, handle) = MockTransport::pair();
        match plan {
            Plan::Unreachable => {
                return Err(ClientError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("{} unreachable", config.address()),
                )))
            }
            Plan::Connack(code) => handle.push_inbound(&[0x20, 0x02, 0x00, code]),
            Plan::Respond(bytes) => handle.push_inbound(&bytes),
            Plan::NoResponse => {}
        }

        self.state.transports.lock().push(handle);
        Ok(Box::new(transport))
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Simulated time since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
