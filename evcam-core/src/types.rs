//! Core record and parameter types.
//!
//! The two record types are `#[repr(C)]` because their in-memory layout is
//! handed to callers as-is. Field order (`x, y, p, t` and `p, t, id`) is the
//! layout downstream tooling expects, so it must not be rearranged.

/// A decoded Change Detection (CD) event.
///
/// CD events represent brightness changes detected by the event camera sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct CdEvent {
    /// X coordinate of the pixel
    pub x: u16,
    /// Y coordinate of the pixel
    pub y: u16,
    /// Event polarity: 0 = OFF (decrease), 1 = ON (increase in brightness)
    pub p: u8,
    /// Timestamp in the session's time unit (microseconds)
    pub t: i64,
}

impl CdEvent {
    /// Creates a new CD event.
    #[inline]
    pub fn new(x: u16, y: u16, p: u8, t: i64) -> Self {
        Self { x, y, p, t }
    }
}

/// An external trigger event.
///
/// Trigger events indicate that an edge (change of electrical state) was
/// detected on an external trigger signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct TriggerEvent {
    /// Edge polarity: 0 = falling edge, 1 = rising edge
    pub p: i16,
    /// Timestamp in the session's time unit (microseconds)
    pub t: i64,
    /// Trigger channel ID
    pub id: i16,
}

impl TriggerEvent {
    /// Creates a new trigger event.
    #[inline]
    pub fn new(p: i16, t: i64, id: i16) -> Self {
        Self { p, t, id }
    }
}

/// Parameters describing how a payload is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Encoding identifier, e.g. `"evt3"`
    pub encoding: String,
    /// Sensor width in pixels
    pub width: u32,
    /// Sensor height in pixels
    pub height: u32,
    /// Time base as carried by the packet; only some codecs use it
    pub time_base: u64,
}

impl DecodeParams {
    pub fn new(encoding: impl Into<String>, width: u32, height: u32, time_base: u64) -> Self {
        Self {
            encoding: encoding.into(),
            width,
            height,
            time_base,
        }
    }

    /// Pairs these parameters with an encoded payload.
    pub fn packet<'a>(&'a self, events: &'a [u8]) -> EventPacket<'a> {
        EventPacket {
            encoding: &self.encoding,
            width: self.width,
            height: self.height,
            time_base: self.time_base,
            events,
        }
    }
}

/// A packet of encoded events together with its decode parameters.
#[derive(Debug, Clone, Copy)]
pub struct EventPacket<'a> {
    pub encoding: &'a str,
    pub width: u32,
    pub height: u32,
    pub time_base: u64,
    /// Encoded payload
    pub events: &'a [u8],
}

impl EventPacket<'_> {
    /// Returns the decode parameters of this packet.
    pub fn params(&self) -> DecodeParams {
        DecodeParams::new(self.encoding, self.width, self.height, self.time_base)
    }
}

/// Outcome of a time-bounded decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeProgress {
    /// True if decoding stopped because the time limit was reached before
    /// the buffer was exhausted
    pub reached_limit: bool,
    /// Time at which decoding stopped
    pub next_time: u64,
}

impl From<DecodeProgress> for (bool, u64) {
    fn from(progress: DecodeProgress) -> Self {
        (progress.reached_limit, progress.next_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_cd_event_layout() {
        assert_eq!(offset_of!(CdEvent, x), 0);
        assert_eq!(offset_of!(CdEvent, y), 2);
        assert_eq!(offset_of!(CdEvent, p), 4);
        assert_eq!(offset_of!(CdEvent, t), 8);
        assert_eq!(size_of::<CdEvent>(), 16);
    }

    #[test]
    fn test_trigger_event_layout() {
        assert_eq!(offset_of!(TriggerEvent, p), 0);
        assert_eq!(offset_of!(TriggerEvent, t), 8);
        assert_eq!(offset_of!(TriggerEvent, id), 16);
        assert_eq!(size_of::<TriggerEvent>(), 24);
    }

    #[test]
    fn test_packet_params() {
        let payload = [0u8; 4];
        let packet = EventPacket {
            encoding: "evt3",
            width: 640,
            height: 480,
            time_base: 7,
            events: &payload,
        };
        let params = packet.params();
        assert_eq!(params, DecodeParams::new("evt3", 640, 480, 7));
        assert_eq!(params.packet(&payload).events.len(), 4);
    }
}
