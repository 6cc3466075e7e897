#![allow(clippy::unusual_byte_groupings)]
//! Field access for EVT 3.0 16-bit words.
//!
//! Each word carries a 4-bit type in its most significant bits followed by a
//! 12-bit payload whose layout depends on the type.

/// EVT 3.0 raw event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RawEventType {
    /// Y coordinate and system type (0x0)
    AddrY = 0x0,
    /// Single valid event with X coordinate and polarity (0x2)
    AddrX = 0x2,
    /// Base X coordinate for subsequent vector events (0x3)
    VectBaseX = 0x3,
    /// Vector event with 12 validity bits (0x4)
    Vect12 = 0x4,
    /// Vector event with 8 validity bits (0x5)
    Vect8 = 0x5,
    /// Lower 12 bits of timestamp (0x6)
    TimeLow = 0x6,
    /// Continued event with 4 bits of data (0x7)
    Continued4 = 0x7,
    /// Upper 12 bits of timestamp (0x8)
    TimeHigh = 0x8,
    /// External trigger event (0xA)
    ExtTrigger = 0xA,
    /// Extension event type (0xE)
    Others = 0xE,
    /// Continued event with 12 bits of data (0xF)
    Continued12 = 0xF,
}

impl RawEventType {
    /// Attempts to parse an event type from a 4-bit value.
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::AddrY),
            0x2 => Some(Self::AddrX),
            0x3 => Some(Self::VectBaseX),
            0x4 => Some(Self::Vect12),
            0x5 => Some(Self::Vect8),
            0x6 => Some(Self::TimeLow),
            0x7 => Some(Self::Continued4),
            0x8 => Some(Self::TimeHigh),
            0xA => Some(Self::ExtTrigger),
            0xE => Some(Self::Others),
            0xF => Some(Self::Continued12),
            _ => None,
        }
    }
}

/// Parses the event type from a 16-bit word.
#[inline]
pub fn parse_event_type(word: u16) -> Option<RawEventType> {
    RawEventType::from_u8(((word >> 12) & 0xF) as u8)
}

/// Builds a word from a type and a 12-bit payload.
#[inline]
pub fn make_word(event_type: RawEventType, payload: u16) -> u16 {
    ((event_type as u16) << 12) | (payload & 0x0FFF)
}

// [11] polarity or system type | [10:0] coordinate
// Shared by ADDR_Y, ADDR_X and VECT_BASE_X.

/// Extracts the 11-bit coordinate.
#[inline]
pub fn coordinate(word: u16) -> u16 {
    word & 0x07FF
}

/// Extracts bit 11 (polarity for ADDR_X / VECT_BASE_X).
#[inline]
pub fn flag(word: u16) -> u8 {
    ((word >> 11) & 0x1) as u8
}

/// Builds a coordinate word with bit 11 set from `flag`.
#[inline]
pub fn make_coordinate_word(event_type: RawEventType, coordinate: u16, flag: u8) -> u16 {
    make_word(
        event_type,
        ((flag as u16 & 0x1) << 11) | (coordinate & 0x07FF),
    )
}

/// Extracts the 12-bit validity mask from a VECT_12 word.
#[inline]
pub fn vect_12_get_valid(word: u16) -> u16 {
    word & 0x0FFF
}

/// Extracts the 8-bit validity mask from a VECT_8 word.
#[inline]
pub fn vect_8_get_valid(word: u16) -> u8 {
    (word & 0x00FF) as u8
}

/// Extracts the 12-bit time value from a TIME_LOW or TIME_HIGH word.
#[inline]
pub fn time_get_value(word: u16) -> u16 {
    word & 0x0FFF
}

// EXT_TRIGGER: [11:8] id | [7:1] unused | [0] value

/// Extracts the trigger channel ID from an EXT_TRIGGER word.
#[inline]
pub fn ext_trigger_get_id(word: u16) -> u8 {
    ((word >> 8) & 0x0F) as u8
}

/// Extracts the trigger value (edge polarity) from an EXT_TRIGGER word.
#[inline]
pub fn ext_trigger_get_value(word: u16) -> u8 {
    (word & 0x01) as u8
}

/// Builds an EXT_TRIGGER word.
#[inline]
pub fn make_ext_trigger_word(value: u8, id: u8) -> u16 {
    make_word(
        RawEventType::ExtTrigger,
        ((id as u16 & 0x0F) << 8) | (value as u16 & 0x1),
    )
}
