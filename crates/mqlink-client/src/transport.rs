//! Byte-stream transports and the connectors that open them.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::tls::{self, TlsStream};

/// An open connection to the broker.
pub trait Transport: Read + Write + Send {
    /// Bound how long a `read` may block. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Close the connection in both directions.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

impl Transport for TlsStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.sock.set_read_timeout(timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.conn.send_close_notify();
        // close_notify is best-effort; the socket is closed either way
        let _ = self.flush();
        self.sock.shutdown(Shutdown::Both)
    }
}

/// Opens transports for the connection manager.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Transport>>;
}

/// Plain TCP, or TLS when `config.tls` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Transport>> {
        let stream = open_tcp(config)?;

        match &config.tls {
            Some(tls_config) => {
                let stream = tls::connect(stream, tls_config, &config.host)?;
                Ok(Box::new(stream))
            }
            None => Ok(Box::new(stream)),
        }
    }
}

fn open_tcp(config: &ClientConfig) -> Result<TcpStream> {
    let address = config.address();
    let mut last_err = None;

    for addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                // Writes happen under the connection lock; never block forever
                stream.set_write_timeout(Some(config.connect_timeout))?;
                return Ok(stream);
            }
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(ClientError::Io(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("Could not resolve address {}", address),
        )
    })))
}
