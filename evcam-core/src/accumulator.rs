//! Event accumulator.
//!
//! Collects the events a decoder produces into two buffers and keeps lifetime
//! counters per polarity / edge. Buffers leave the accumulator by move, so
//! the caller becomes their sole owner and nothing is copied.

use crate::codec::EventSink;
use crate::types::{CdEvent, TriggerEvent};

/// Accumulates decoded events between extractions.
#[derive(Debug, Default)]
pub struct Accumulator {
    width: u32,
    height: u32,
    cd_events: Vec<CdEvent>,
    trigger_events: Vec<TriggerEvent>,
    // [off, on]
    cd_counts: [usize; 2],
    // [falling, rising]
    trigger_counts: [usize; 2],
    // Peak buffer lengths, used to pre-size the next decode
    max_cd_len: usize,
    max_trigger_len: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the sensor geometry.
    pub fn initialize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Empties both buffers, keeping room for as many events as the
    /// largest decode so far. Counters are untouched.
    pub fn reset_stored_events(&mut self) {
        self.cd_events.clear();
        self.cd_events.reserve(self.max_cd_len);
        self.trigger_events.clear();
        self.trigger_events.reserve(self.max_trigger_len);
    }

    /// Takes the accumulated CD events, leaving an empty buffer behind.
    pub fn extract_cd_events(&mut self) -> Vec<CdEvent> {
        std::mem::take(&mut self.cd_events)
    }

    /// Takes the accumulated trigger events, leaving an empty buffer behind.
    pub fn extract_ext_trigger_events(&mut self) -> Vec<TriggerEvent> {
        std::mem::take(&mut self.trigger_events)
    }

    /// Number of CD events currently held.
    pub fn cd_len(&self) -> usize {
        self.cd_events.len()
    }

    /// Number of trigger events currently held.
    pub fn trigger_len(&self) -> usize {
        self.trigger_events.len()
    }

    /// Lifetime number of OFF events.
    pub fn cd_off_count(&self) -> usize {
        self.cd_counts[0]
    }

    /// Lifetime number of ON events.
    pub fn cd_on_count(&self) -> usize {
        self.cd_counts[1]
    }

    /// Lifetime number of falling trigger edges.
    pub fn trigger_falling_count(&self) -> usize {
        self.trigger_counts[0]
    }

    /// Lifetime number of rising trigger edges.
    pub fn trigger_rising_count(&self) -> usize {
        self.trigger_counts[1]
    }
}

impl EventSink for Accumulator {
    #[inline]
    fn on_cd_event(&mut self, sensor_time: u64, x: u16, y: u16, polarity: u8) {
        self.cd_events
            .push(CdEvent::new(x, y, polarity, sensor_time as i64));
        self.max_cd_len = self.max_cd_len.max(self.cd_events.len());
        self.cd_counts[polarity.min(1) as usize] += 1;
    }

    #[inline]
    fn on_ext_trigger(&mut self, sensor_time: u64, edge: u8, id: u8) {
        self.trigger_events.push(TriggerEvent::new(
            edge as i16,
            sensor_time as i64,
            id as i16,
        ));
        self.max_trigger_len = self.max_trigger_len.max(self.trigger_events.len());
        self.trigger_counts[edge.min(1) as usize] += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> Accumulator {
        let mut acc = Accumulator::new();
        acc.initialize(640, 480);
        acc.on_cd_event(10, 1, 2, 1);
        acc.on_cd_event(11, 3, 4, 0);
        acc.on_cd_event(12, 5, 6, 1);
        acc.on_ext_trigger(13, 1, 0);
        acc
    }

    #[test]
    fn test_callbacks_append_in_order() {
        let mut acc = filled();
        assert_eq!(
            acc.extract_cd_events(),
            vec![
                CdEvent::new(1, 2, 1, 10),
                CdEvent::new(3, 4, 0, 11),
                CdEvent::new(5, 6, 1, 12),
            ]
        );
        assert_eq!(
            acc.extract_ext_trigger_events(),
            vec![TriggerEvent::new(1, 13, 0)]
        );
        assert_eq!((acc.width(), acc.height()), (640, 480));
    }

    #[test]
    fn test_extract_is_read_once() {
        let mut acc = filled();
        assert_eq!(acc.extract_cd_events().len(), 3);
        assert!(acc.extract_cd_events().is_empty());
        assert_eq!(acc.extract_ext_trigger_events().len(), 1);
        assert!(acc.extract_ext_trigger_events().is_empty());
    }

    #[test]
    fn test_extract_moves_buffer() {
        let mut acc = filled();
        let ptr = acc.cd_events.as_ptr();
        let events = acc.extract_cd_events();
        assert_eq!(events.as_ptr(), ptr);
        assert_eq!(acc.cd_events.capacity(), 0);
    }

    #[test]
    fn test_reset_keeps_counters() {
        let mut acc = filled();
        acc.reset_stored_events();
        assert_eq!(acc.cd_len(), 0);
        assert_eq!(acc.trigger_len(), 0);
        assert!(acc.extract_cd_events().is_empty());
        assert!(acc.extract_ext_trigger_events().is_empty());
        assert_eq!(acc.cd_on_count(), 2);
        assert_eq!(acc.cd_off_count(), 1);
        assert_eq!(acc.trigger_rising_count(), 1);
        assert_eq!(acc.trigger_falling_count(), 0);
    }

    #[test]
    fn test_reset_presizes_from_peak() {
        let mut acc = filled();
        acc.extract_cd_events();
        acc.reset_stored_events();
        assert!(acc.cd_events.capacity() >= 3);
        assert!(acc.trigger_events.capacity() >= 1);
    }

    #[test]
    fn test_polarity_clamped_for_counts() {
        let mut acc = Accumulator::new();
        acc.on_cd_event(0, 0, 0, 7);
        acc.on_ext_trigger(0, 3, 1);
        assert_eq!(acc.cd_on_count(), 1);
        assert_eq!(acc.trigger_rising_count(), 1);
        assert_eq!(acc.extract_cd_events()[0].p, 7);
    }
}
