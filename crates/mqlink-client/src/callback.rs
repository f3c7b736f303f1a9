//! Handler registration and event dispatch.
//!
//! Handlers run on the connection manager thread (`connected`) or the reader
//! thread (everything else). The registry lock is released before a handler
//! is called, so handlers may register other handlers or call back into the
//! client.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::events::ClientEvent;

type ConnectedFn = Arc<dyn Fn(bool) + Send + Sync>;
type AckFn = Arc<dyn Fn(u16) + Send + Sync>;
type SubAckFn = Arc<dyn Fn(u16, u8) + Send + Sync>;
type MessageFn = Arc<dyn Fn(&str, &Bytes) + Send + Sync>;

/// Handler trait for MQTT events.
///
/// An alternative to registering closures one by one: implement the
/// methods you care about and pass the handler to
/// [`CallbackRegistry::set_handler`]. All methods default to doing nothing.
pub trait MqttHandler: Send + Sync {
    /// Called when the connection comes up (`true`) or is lost (`false`).
    #[allow(unused_variables)]
    fn on_connected(&self, connected: bool) {}

    /// Called when a QoS 1 publish has been acknowledged.
    #[allow(unused_variables)]
    fn on_puback(&self, packet_id: u16) {}

    /// Called when a subscribe request has been acknowledged.
    ///
    /// `return_code` is the granted QoS, or 0x80 if the broker refused.
    #[allow(unused_variables)]
    fn on_suback(&self, packet_id: u16, return_code: u8) {}

    /// Called when an unsubscribe request has been acknowledged.
    #[allow(unused_variables)]
    fn on_unsuback(&self, packet_id: u16) {}

    /// Called when a message is received.
    #[allow(unused_variables)]
    fn on_message(&self, topic: &str, payload: &[u8]) {}
}

#[derive(Default, Clone)]
struct Handlers {
    connected: Option<ConnectedFn>,
    puback: Option<AckFn>,
    suback: Option<SubAckFn>,
    unsuback: Option<AckFn>,
    message: Option<MessageFn>,
}

/// At most one handler per event kind; setting a handler replaces the previous one.
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: RwLock<Handlers>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connected<F>(&self, f: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.handlers.write().connected = Some(Arc::new(f));
    }

    pub fn on_puback<F>(&self, f: F)
    where
        F: Fn(u16) + Send + Sync + 'static,
    {
        self.handlers.write().puback = Some(Arc::new(f));
    }

    pub fn on_suback<F>(&self, f: F)
    where
        F: Fn(u16, u8) + Send + Sync + 'static,
    {
        self.handlers.write().suback = Some(Arc::new(f));
    }

    pub fn on_unsuback<F>(&self, f: F)
    where
        F: Fn(u16) + Send + Sync + 'static,
    {
        self.handlers.write().unsuback = Some(Arc::new(f));
    }

    pub fn on_message<F>(&self, f: F)
    where
        F: Fn(&str, &Bytes) + Send + Sync + 'static,
    {
        self.handlers.write().message = Some(Arc::new(f));
    }

    /// Route every event kind to one handler object.
    pub fn set_handler<H: MqttHandler + 'static>(&self, handler: Arc<H>) {
        let mut handlers = self.handlers.write();

        let h = handler.clone();
        handlers.connected = Some(Arc::new(move |connected| h.on_connected(connected)));
        let h = handler.clone();
        handlers.puback = Some(Arc::new(move |id| h.on_puback(id)));
        let h = handler.clone();
        handlers.suback = Some(Arc::new(move |id, code| h.on_suback(id, code)));
        let h = handler.clone();
        handlers.unsuback = Some(Arc::new(move |id| h.on_unsuback(id)));
        handlers.message = Some(Arc::new(move |topic: &str, payload: &Bytes| {
            handler.on_message(topic, payload)
        }));
    }

    /// Remove all handlers.
    pub fn clear(&self) {
        *self.handlers.write() = Handlers::default();
    }

    /// Invoke the handler matching `event`, if one is registered.
    pub fn dispatch(&self, event: ClientEvent) {
        // Clone the Arc out so the lock is not held while the handler runs
        let handlers = self.handlers.read().clone();

        match event {
            ClientEvent::Connected(connected) => {
                if let Some(f) = handlers.connected {
                    f(connected);
                }
            }
            ClientEvent::PubAck(packet_id) => {
                if let Some(f) = handlers.puback {
                    f(packet_id);
                }
            }
            ClientEvent::SubAck {
                packet_id,
                return_code,
            } => {
                if let Some(f) = handlers.suback {
                    f(packet_id, return_code);
                }
            }
            ClientEvent::UnsubAck(packet_id) => {
                if let Some(f) = handlers.unsuback {
                    f(packet_id);
                }
            }
            ClientEvent::Message { topic, payload } => {
                if let Some(f) = handlers.message {
                    f(&topic, &payload);
                }
            }
        }
    }
}
