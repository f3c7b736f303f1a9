//! Will message (Last Will and Testament) support.
//!
//! - [MQTT-3.1.2-8] If Will Flag is set, the broker publishes the Will Message on abnormal disconnect
//! - [MQTT-3.1.2-9] Will Topic and Will Message fields MUST be present if Will Flag is set

use bytes::Bytes;
use mqlink_core::QoS;

use crate::error::{ClientError, Result};

/// Last Will and Testament message.
///
/// The Will Message is published by the broker if the client disconnects
/// unexpectedly (without sending DISCONNECT).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    /// Topic to publish the will message to.
    pub topic: String,
    /// Will message payload.
    pub payload: Bytes,
    /// QoS level for will message delivery.
    pub qos: QoS,
    /// Whether the will message should be retained.
    pub retain: bool,
}

impl Will {
    /// Create a new will message with QoS 0 and no retain.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    /// Set the QoS level for the will message.
    pub fn qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Set whether the will message should be retained.
    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.topic.is_empty() {
            return Err(ClientError::InvalidInput("will topic must not be empty".into()));
        }
        if self.qos == QoS::ExactlyOnce {
            return Err(ClientError::InvalidQoS(self.qos as u8));
        }
        Ok(())
    }

    pub(crate) fn to_packet(&self) -> mqlink_core::Will {
        mqlink_core::Will {
            topic: self.topic.clone(),
            payload: self.payload.clone(),
            qos: self.qos,
            retain: self.retain,
        }
    }
}
