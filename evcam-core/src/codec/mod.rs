//! Codec capabilities and the built-in codecs.
//!
//! A codec turns an encoded byte payload into a stream of primitive event
//! callbacks on an [`EventSink`]. Codecs are looked up by encoding name
//! through a [`DecoderRegistry`].

pub mod evt3;
pub mod mono;
pub mod registry;

pub use evt3::{Evt3Decoder, Evt3Encoder};
pub use mono::{MonoDecoder, MonoEncoder};
pub use registry::{DecoderFactory, DecoderRegistry};

use crate::error::Result;
use crate::types::DecodeProgress;

/// Time unit multiplier that makes codecs report nanoseconds.
pub const NANOSECONDS_PER_MICROSECOND: u32 = 1000;

/// Receiver of primitive events produced by a [`RawDecoder`].
pub trait EventSink {
    /// Called for every change detection event.
    fn on_cd_event(&mut self, sensor_time: u64, x: u16, y: u16, polarity: u8);

    /// Called for every external trigger edge.
    fn on_ext_trigger(&mut self, sensor_time: u64, edge: u8, id: u8);
}

/// A decoder for one encoding.
///
/// Implementations are stateful: state such as the current time or row
/// carries over from one call to the next, so consecutive packets of a
/// stream should go through the same instance.
pub trait RawDecoder {
    /// Encoding identifier handled by this decoder.
    fn encoding(&self) -> &str;

    /// Sets the time base used by codecs with relative timestamps.
    fn set_time_base(&mut self, time_base: u64);

    /// Sets how many output time units make up one microsecond.
    fn set_time_unit_multiplier(&mut self, multiplier: u32);

    /// Decodes the whole buffer.
    fn decode(&mut self, buf: &[u8], sink: &mut dyn EventSink) -> Result<()>;

    /// Decodes until an event with time `>= until_time` would be produced.
    ///
    /// If the limit is reached the stopping position is remembered and the
    /// next call on the same buffer (same address and length) resumes
    /// there. A different buffer is decoded from its start.
    fn decode_until(
        &mut self,
        buf: &[u8],
        sink: &mut dyn EventSink,
        until_time: u64,
        time_base: u64,
    ) -> Result<DecodeProgress>;
}

/// Position where an interrupted `decode_until` continues.
///
/// The position is bound to the buffer it was recorded in (address and
/// length). Any other buffer starts from the beginning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ResumePoint {
    buffer: Option<(usize, usize)>,
    index: usize,
}

impl ResumePoint {
    fn buffer_id(buf: &[u8]) -> (usize, usize) {
        (buf.as_ptr() as usize, buf.len())
    }

    /// Unit index to start from when decoding `buf`.
    pub(crate) fn start_in(&self, buf: &[u8]) -> usize {
        if self.buffer == Some(Self::buffer_id(buf)) {
            self.index
        } else {
            0
        }
    }

    pub(crate) fn stop_at(&mut self, buf: &[u8], index: usize) {
        self.buffer = Some(Self::buffer_id(buf));
        self.index = index;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
