//! Packet identifier allocation.
//!
//! - [MQTT-2.3.1-1] SUBSCRIBE, UNSUBSCRIBE and QoS > 0 PUBLISH carry a non-zero 16-bit Packet Identifier.
//!
//! Acknowledgements are not tracked, so there is no in-flight set: ids are
//! handed out in sequence starting at 1 and wrap past 65535 back to 1.

/// Sequential packet identifier source shared by publish, subscribe and unsubscribe.
#[derive(Debug)]
pub struct PacketIdAllocator {
    next_id: u16,
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketIdAllocator {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Take the next identifier.
    pub fn allocate(&mut self) -> u16 {
        let id = self.next_id;
        self.advance_next();
        id
    }

    /// The identifier the next `allocate` call will return.
    pub fn peek(&self) -> u16 {
        self.next_id
    }

    /// Advance next_id, skipping 0.
    fn advance_next(&mut self) {
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id == 0 {
            self.next_id = 1;
        }
    }
}
