//! Fixed-width `mono` codec.
//!
//! Every CD event is one little-endian 64-bit record:
//!
//! | bits   | field                                   |
//! |--------|-----------------------------------------|
//! | 0..32  | time offset from the time base, in ns   |
//! | 32..48 | x                                       |
//! | 48..63 | y                                       |
//! | 63     | polarity                                |
//!
//! The packet's time base is in nanoseconds.

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use super::{EventSink, RawDecoder, ResumePoint, NANOSECONDS_PER_MICROSECOND};
use crate::error::{DecodeError, Result};
use crate::types::DecodeProgress;

const RECORD_SIZE: usize = 8;

#[inline]
fn unpack(record: u64) -> (u64, u16, u16, u8) {
    let dt = record & 0xFFFF_FFFF;
    let x = ((record >> 32) & 0xFFFF) as u16;
    let y = ((record >> 48) & 0x7FFF) as u16;
    let polarity = (record >> 63) as u8;
    (dt, x, y, polarity)
}

#[inline]
fn pack(dt: u32, x: u16, y: u16, polarity: u8) -> u64 {
    (dt as u64)
        | ((x as u64) << 32)
        | (((y & 0x7FFF) as u64) << 48)
        | (((polarity & 0x1) as u64) << 63)
}

/// Decoder for the `mono` encoding.
#[derive(Debug)]
pub struct MonoDecoder {
    time_base: u64,
    time_multiplier: u64,
    last_time: u64,
    resume: ResumePoint,
}

impl Default for MonoDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoDecoder {
    pub const ENCODING: &'static str = "mono";

    /// Creates a decoder reporting nanoseconds.
    pub fn new() -> Self {
        Self {
            time_base: 0,
            time_multiplier: NANOSECONDS_PER_MICROSECOND as u64,
            last_time: 0,
            resume: ResumePoint::default(),
        }
    }

    /// Converts a record offset to output time units.
    ///
    /// Computed in 128 bits: epoch time bases in nanoseconds times the
    /// default multiplier do not fit in 64.
    #[inline]
    fn output_time(&self, dt: u64) -> Result<u64> {
        let time = (self.time_base as u128 + dt as u128) * self.time_multiplier as u128
            / NANOSECONDS_PER_MICROSECOND as u128;
        u64::try_from(time).map_err(|_| {
            DecodeError::malformed(
                Self::ENCODING,
                format!(
                    "time base {} plus offset {} overflows the output time",
                    self.time_base, dt
                ),
            )
        })
    }

    fn record_count(buf: &[u8]) -> Result<usize> {
        if buf.len() % RECORD_SIZE != 0 {
            return Err(DecodeError::malformed(
                Self::ENCODING,
                format!("length {} is not a multiple of {}", buf.len(), RECORD_SIZE),
            ));
        }
        Ok(buf.len() / RECORD_SIZE)
    }

    fn run(
        &mut self,
        buf: &[u8],
        start: usize,
        sink: &mut dyn EventSink,
        limit: Option<u64>,
    ) -> Result<Option<(usize, u64)>> {
        for (i, chunk) in buf.chunks_exact(RECORD_SIZE).enumerate().skip(start) {
            let (dt, x, y, polarity) = unpack(LittleEndian::read_u64(chunk));
            let time = self.output_time(dt)?;
            if limit.is_some_and(|limit| time >= limit) {
                return Ok(Some((i, time)));
            }
            sink.on_cd_event(time, x, y, polarity);
            self.last_time = time;
        }
        Ok(None)
    }
}

impl RawDecoder for MonoDecoder {
    fn encoding(&self) -> &str {
        Self::ENCODING
    }

    fn set_time_base(&mut self, time_base: u64) {
        self.time_base = time_base;
    }

    fn set_time_unit_multiplier(&mut self, multiplier: u32) {
        self.time_multiplier = multiplier as u64;
    }

    fn decode(&mut self, buf: &[u8], sink: &mut dyn EventSink) -> Result<()> {
        let n_records = Self::record_count(buf)?;
        self.resume.clear();
        self.run(buf, 0, sink, None)?;
        trace!(records = n_records, "decoded mono buffer");
        Ok(())
    }

    fn decode_until(
        &mut self,
        buf: &[u8],
        sink: &mut dyn EventSink,
        until_time: u64,
        time_base: u64,
    ) -> Result<DecodeProgress> {
        Self::record_count(buf)?;
        self.time_base = time_base;
        let start = self.resume.start_in(buf);

        match self.run(buf, start, sink, Some(until_time))? {
            Some((stop_record, next_time)) => {
                self.resume.stop_at(buf, stop_record);
                Ok(DecodeProgress {
                    reached_limit: true,
                    next_time,
                })
            }
            None => {
                self.resume.clear();
                Ok(DecodeProgress {
                    reached_limit: false,
                    next_time: self.last_time,
                })
            }
        }
    }
}

/// Builds `mono` payloads.
#[derive(Debug, Default)]
pub struct MonoEncoder {
    buf: Vec<u8>,
}

impl MonoEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a CD event `dt` nanoseconds after the packet time base.
    pub fn encode_cd(&mut self, dt: u32, x: u16, y: u16, polarity: u8) {
        let mut record = [0u8; RECORD_SIZE];
        LittleEndian::write_u64(&mut record, pack(dt, x, y, polarity));
        self.buf.extend_from_slice(&record);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
