//! Reference EVT 3.0 encoder.
//!
//! Produces the minimal word sequence for a series of events: time and row
//! words are only emitted when they change. Events must be fed in
//! non-decreasing time order.

use byteorder::{ByteOrder, LittleEndian};

use super::parser::{self, RawEventType};

/// Builds EVT 3.0 payloads.
#[derive(Debug, Default)]
pub struct Evt3Encoder {
    words: Vec<u16>,
    time_high: Option<u64>,
    time_low: Option<u64>,
    y: Option<u16>,
}

impl Evt3Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of words encoded so far.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn set_time(&mut self, sensor_time: u64) {
        let high = (sensor_time >> 12) & 0xFFF;
        let low = sensor_time & 0xFFF;
        if self.time_high != Some(high) {
            self.words
                .push(parser::make_word(RawEventType::TimeHigh, high as u16));
            self.time_high = Some(high);
            // TIME_HIGH resets the low bits on the decoder side
            self.time_low = None;
        }
        if self.time_low != Some(low) {
            self.words
                .push(parser::make_word(RawEventType::TimeLow, low as u16));
            self.time_low = Some(low);
        }
    }

    fn set_y(&mut self, y: u16) {
        if self.y != Some(y) {
            self.words
                .push(parser::make_coordinate_word(RawEventType::AddrY, y, 0));
            self.y = Some(y);
        }
    }

    /// Encodes a single CD event. `sensor_time` is in microseconds.
    pub fn encode_cd(&mut self, sensor_time: u64, x: u16, y: u16, polarity: u8) {
        self.set_time(sensor_time);
        self.set_y(y);
        self.words
            .push(parser::make_coordinate_word(RawEventType::AddrX, x, polarity));
    }

    /// Encodes up to 12 events on row `y` starting at `base_x` as one vector.
    ///
    /// Bit `i` of `valid` marks an event at `base_x + i`.
    pub fn encode_vector(
        &mut self,
        sensor_time: u64,
        base_x: u16,
        y: u16,
        polarity: u8,
        valid: u16,
    ) {
        self.set_time(sensor_time);
        self.set_y(y);
        self.words.push(parser::make_coordinate_word(
            RawEventType::VectBaseX,
            base_x,
            polarity,
        ));
        self.words
            .push(parser::make_word(RawEventType::Vect12, valid));
    }

    /// Encodes an external trigger edge.
    pub fn encode_trigger(&mut self, sensor_time: u64, value: u8, id: u8) {
        self.set_time(sensor_time);
        self.words.push(parser::make_ext_trigger_word(value, id));
    }

    /// Returns the encoded little-endian payload.
    pub fn finish(self) -> Vec<u8> {
        let mut buf = vec![0u8; self.words.len() * 2];
        LittleEndian::write_u16_into(&self.words, &mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::RecordingSink;
    use crate::codec::{Evt3Decoder, RawDecoder};

    fn decode(buf: &[u8]) -> RecordingSink {
        let mut decoder = Evt3Decoder::new();
        decoder.set_time_unit_multiplier(1);
        let mut sink = RecordingSink::default();
        decoder.decode(buf, &mut sink).unwrap();
        sink
    }

    #[test]
    fn test_minimal_words() {
        let mut encoder = Evt3Encoder::new();
        encoder.encode_cd(100, 1, 5, 1);
        // TIME_HIGH, TIME_LOW, ADDR_Y, ADDR_X
        assert_eq!(encoder.len(), 4);
        encoder.encode_cd(100, 2, 5, 0);
        assert_eq!(encoder.len(), 5);
        encoder.encode_cd(101, 2, 6, 0);
        assert_eq!(encoder.len(), 8);
    }

    #[test]
    fn test_events_survive_decoding_in_order() {
        let mut encoder = Evt3Encoder::new();
        encoder.encode_cd(10, 1, 2, 1);
        encoder.encode_trigger(20, 1, 3);
        encoder.encode_cd(5000, 639, 479, 0);
        encoder.encode_trigger(9000, 0, 3);
        encoder.encode_cd(70_000, 7, 8, 1);

        let sink = decode(&encoder.finish());
        assert_eq!(
            sink.cd,
            vec![(10, 1, 2, 1), (5000, 639, 479, 0), (70_000, 7, 8, 1)]
        );
        assert_eq!(sink.triggers, vec![(20, 1, 3), (9000, 0, 3)]);
    }

    #[test]
    fn test_vector_encoding() {
        let mut encoder = Evt3Encoder::new();
        encoder.encode_vector(42, 100, 3, 1, 0b1000_0000_0101);
        let sink = decode(&encoder.finish());
        assert_eq!(sink.cd, vec![(42, 100, 3, 1), (42, 102, 3, 1), (42, 111, 3, 1)]);
    }
}
