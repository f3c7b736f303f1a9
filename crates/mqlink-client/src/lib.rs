//! mqlink-client - Threaded MQTT 3.1.1 client.
//!
//! A background manager thread keeps the broker connection up: it connects,
//! retries on an interval when the broker is unreachable or refuses, and
//! sends keep-alive pings. A reader thread per connection delivers inbound
//! packets to registered handlers. Publishing, subscribing and
//! unsubscribing are plain blocking calls from any thread.
//!
//! # Example
//!
//! ```no_run
//! use mqlink_client::{Client, ClientConfig, QoS};
//!
//! # fn main() -> mqlink_client::Result<()> {
//! let config = ClientConfig::new("localhost", 1883).client_id("my-client");
//! let client = Client::new(config);
//!
//! let subscriber = client.clone();
//! client.on_connected(move |up| {
//!     if up {
//!         let _ = subscriber.subscribe("sensors/#", QoS::AtLeastOnce);
//!     }
//! });
//! client.on_message(|topic, payload| {
//!     println!("{} -> {:?}", topic, payload);
//! });
//!
//! client.connect(None)?;
//! # client.disconnect()?;
//! # Ok(())
//! # }
//! ```
//!
//! Only QoS 0 and 1 are supported; QoS 2 is rejected with
//! [`ClientError::InvalidQoS`].

mod callback;
mod client;
mod clock;
mod config;
mod connection;
mod error;
mod events;
mod packet_id;
mod reader;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod tls;
mod transport;
mod will;

pub use crate::callback::{CallbackRegistry, MqttHandler};
pub use crate::client::Client;
pub use crate::clock::{Clock, SystemClock};
pub use crate::config::{ClientConfig, ConnectOptions, TlsConfig};
pub use crate::error::{ClientError, Result};
pub use crate::events::{ClientEvent, ConnectionState};
pub use crate::packet_id::PacketIdAllocator;
pub use crate::transport::{Connector, TcpConnector, Transport};
pub use crate::will::Will;

// Re-export useful types from core
pub use mqlink_core::{ConnackCode, QoS};
