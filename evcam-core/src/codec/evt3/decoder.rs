//! Stateful EVT 3.0 decoder.
//!
//! Tracks timestamp, row and vector base across words and across calls, so
//! a stream split into packets decodes the same as one contiguous buffer.

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use super::parser::{self, RawEventType};
use crate::codec::{EventSink, RawDecoder, ResumePoint, NANOSECONDS_PER_MICROSECOND};
use crate::error::{DecodeError, Result};
use crate::types::DecodeProgress;

/// Constants for timestamp handling.
const MAX_TIMESTAMP_BASE: u64 = ((1u64 << 12) - 1) << 12; // 16773120us
const TIME_LOOP: u64 = MAX_TIMESTAMP_BASE + (1 << 12); // 16777216us
const LOOP_THRESHOLD: u64 = 10 << 12; // Threshold for loop detection

/// Stateful EVT 3.0 decoder.
#[derive(Debug)]
pub struct Evt3Decoder {
    // Timestamp state, in sensor microseconds
    time_high_base: u64,
    current_time: u64,
    n_time_high_loops: u64,
    first_time_base_set: bool,

    // Address/polarity state
    current_y: u16,
    current_base_x: u16,
    current_polarity: u8,

    time_multiplier: u64,
    // Word where an interrupted decode_until resumes
    resume: ResumePoint,
}

impl Default for Evt3Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Evt3Decoder {
    pub const ENCODING: &'static str = "evt3";

    /// Creates a new decoder reporting nanoseconds.
    pub fn new() -> Self {
        Self {
            time_high_base: 0,
            current_time: 0,
            n_time_high_loops: 0,
            first_time_base_set: false,
            current_y: 0,
            current_base_x: 0,
            current_polarity: 0,
            time_multiplier: NANOSECONDS_PER_MICROSECOND as u64,
            resume: ResumePoint::default(),
        }
    }

    #[inline]
    fn output_time(&self, sensor_time: u64) -> u64 {
        sensor_time * self.time_multiplier
    }

    fn word_count(buf: &[u8]) -> Result<usize> {
        if buf.len() % 2 != 0 {
            return Err(DecodeError::malformed(
                Self::ENCODING,
                format!("length {} is not a multiple of 2", buf.len()),
            ));
        }
        Ok(buf.len() / 2)
    }

    /// Runs the state machine from word `start`.
    ///
    /// Returns the index and time of the first time word that would move the
    /// clock to or past `limit`. That word is left unapplied.
    fn run(
        &mut self,
        buf: &[u8],
        start: usize,
        sink: &mut dyn EventSink,
        limit: Option<u64>,
    ) -> Option<(usize, u64)> {
        let reaches = |t: u64| limit.is_some_and(|limit| t >= limit);

        if self.first_time_base_set && reaches(self.output_time(self.current_time)) {
            return Some((start, self.output_time(self.current_time)));
        }

        let n_words = buf.len() / 2;
        for i in start..n_words {
            let word = LittleEndian::read_u16(&buf[2 * i..]);
            let event_type = parser::parse_event_type(word);

            // Skip until first TIME_HIGH
            if !self.first_time_base_set {
                if event_type == Some(RawEventType::TimeHigh) {
                    let time_high_base = (parser::time_get_value(word) as u64) << 12;
                    if reaches(self.output_time(time_high_base)) {
                        return Some((i, self.output_time(time_high_base)));
                    }
                    self.time_high_base = time_high_base;
                    self.current_time = time_high_base;
                    self.first_time_base_set = true;
                }
                continue;
            }

            match event_type {
                Some(RawEventType::AddrX) => {
                    sink.on_cd_event(
                        self.output_time(self.current_time),
                        parser::coordinate(word),
                        self.current_y,
                        parser::flag(word),
                    );
                }

                Some(RawEventType::Vect12) => {
                    let valid = parser::vect_12_get_valid(word);
                    self.process_vector_events(valid as u32, 12, sink);
                }

                Some(RawEventType::Vect8) => {
                    let valid = parser::vect_8_get_valid(word);
                    self.process_vector_events(valid as u32, 8, sink);
                }

                Some(RawEventType::AddrY) => {
                    self.current_y = parser::coordinate(word);
                }

                Some(RawEventType::VectBaseX) => {
                    self.current_base_x = parser::coordinate(word);
                    self.current_polarity = parser::flag(word);
                }

                Some(RawEventType::TimeHigh) => {
                    let (time_high_base, looped) = self.next_time_high_base(word);
                    if reaches(self.output_time(time_high_base)) {
                        return Some((i, self.output_time(time_high_base)));
                    }
                    if looped {
                        self.n_time_high_loops += 1;
                    }
                    self.time_high_base = time_high_base;
                    self.current_time = time_high_base;
                }

                Some(RawEventType::TimeLow) => {
                    let time = self.time_high_base + parser::time_get_value(word) as u64;
                    if reaches(self.output_time(time)) {
                        return Some((i, self.output_time(time)));
                    }
                    self.current_time = time;
                }

                Some(RawEventType::ExtTrigger) => {
                    sink.on_ext_trigger(
                        self.output_time(self.current_time),
                        parser::ext_trigger_get_value(word),
                        parser::ext_trigger_get_id(word),
                    );
                }

                Some(RawEventType::Continued4)
                | Some(RawEventType::Others)
                | Some(RawEventType::Continued12)
                | None => {}
            }
        }
        None
    }

    /// Computes the time base a TIME_HIGH word moves to, with loop detection.
    #[inline]
    fn next_time_high_base(&self, word: u16) -> (u64, bool) {
        let time_val = parser::time_get_value(word) as u64;
        let new_time_base = (time_val << 12) + (self.n_time_high_loops * TIME_LOOP);

        // Went back in time due to wrap
        if self.time_high_base > new_time_base
            && (self.time_high_base - new_time_base) >= (MAX_TIMESTAMP_BASE - LOOP_THRESHOLD)
        {
            (new_time_base + TIME_LOOP, true)
        } else {
            (new_time_base, false)
        }
    }

    /// Emits CD events for the set bits of a VECT_12 / VECT_8 mask.
    #[inline]
    fn process_vector_events(&mut self, mut valid: u32, count: u16, sink: &mut dyn EventSink) {
        let end_x = self.current_base_x.wrapping_add(count);
        let time = self.output_time(self.current_time);

        for offset in 0..count {
            if valid & 0x1 != 0 {
                sink.on_cd_event(
                    time,
                    self.current_base_x.wrapping_add(offset),
                    self.current_y,
                    self.current_polarity,
                );
            }
            valid >>= 1;
        }

        self.current_base_x = end_x;
    }
}

impl RawDecoder for Evt3Decoder {
    fn encoding(&self) -> &str {
        Self::ENCODING
    }

    /// EVT 3.0 carries absolute sensor time, so the time base is unused.
    fn set_time_base(&mut self, _time_base: u64) {}

    fn set_time_unit_multiplier(&mut self, multiplier: u32) {
        self.time_multiplier = multiplier as u64;
    }

    fn decode(&mut self, buf: &[u8], sink: &mut dyn EventSink) -> Result<()> {
        Self::word_count(buf)?;
        self.resume.clear();
        self.run(buf, 0, sink, None);
        trace!(bytes = buf.len(), time = self.current_time, "decoded evt3 buffer");
        Ok(())
    }

    fn decode_until(
        &mut self,
        buf: &[u8],
        sink: &mut dyn EventSink,
        until_time: u64,
        _time_base: u64,
    ) -> Result<DecodeProgress> {
        Self::word_count(buf)?;
        let start = self.resume.start_in(buf);

        match self.run(buf, start, sink, Some(until_time)) {
            Some((stop_word, next_time)) => {
                self.resume.stop_at(buf, stop_word);
                Ok(DecodeProgress {
                    reached_limit: true,
                    next_time,
                })
            }
            None => {
                self.resume.clear();
                Ok(DecodeProgress {
                    reached_limit: false,
                    next_time: self.output_time(self.current_time),
                })
            }
        }
    }
}
