//! Decode session controller.
//!
//! A [`Session`] owns a decoder registry and an [`Accumulator`]. Each decode
//! resolves the decoder for the packet's encoding and geometry, switches it to
//! microsecond output, empties the accumulator and streams the payload
//! through the decoder. Decoded events stay in the accumulator until they are
//! extracted.
//!
//! # Example
//!
//! ```
//! use evcam_core::codec::Evt3Encoder;
//! use evcam_core::Session;
//!
//! let mut encoder = Evt3Encoder::new();
//! encoder.encode_cd(100, 3, 4, 1);
//! let payload = encoder.finish();
//!
//! let mut session = Session::new();
//! let handle = session.resolve_and_configure("evt3", 640, 480, 0).unwrap();
//! session.decode_full(&handle, &payload).unwrap();
//!
//! let events = session.extract_cd_events();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].t, 100);
//! assert_eq!(session.cd_on_count(), 1);
//! ```

use tracing::{debug, trace};

use crate::accumulator::Accumulator;
use crate::codec::{DecoderRegistry, RawDecoder};
use crate::error::{DecodeError, Result};
use crate::types::{CdEvent, DecodeProgress, EventPacket, TriggerEvent};

/// Time unit multiplier used by sessions: report microseconds.
pub const TIME_UNIT_MULTIPLIER: u32 = 1;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No decoder has been configured yet
    Uninitialized,
    /// A decoder is configured; events may be extracted or decoded
    Configured,
}

/// Identifies a configured decoder within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderHandle {
    encoding: String,
    width: u32,
    height: u32,
    time_base: u64,
}

impl DecoderHandle {
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn time_base(&self) -> u64 {
        self.time_base
    }
}

/// A single-threaded decode session.
#[derive(Debug)]
pub struct Session {
    registry: DecoderRegistry,
    accumulator: Accumulator,
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session with the built-in codecs.
    pub fn new() -> Self {
        Self::with_registry(DecoderRegistry::default())
    }

    /// Creates a session using a custom registry.
    pub fn with_registry(registry: DecoderRegistry) -> Self {
        Self {
            registry,
            accumulator: Accumulator::new(),
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Mutable access for registering additional encodings.
    pub fn registry_mut(&mut self) -> &mut DecoderRegistry {
        &mut self.registry
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Looks up and configures the decoder for a stream.
    ///
    /// Fails with [`DecodeError::UnsupportedEncoding`] without touching the
    /// accumulator if no decoder exists for `encoding`.
    pub fn resolve_and_configure(
        &mut self,
        encoding: &str,
        width: u32,
        height: u32,
        time_base: u64,
    ) -> Result<DecoderHandle> {
        let decoder = self
            .registry
            .get_instance(encoding, width, height)
            .ok_or_else(|| DecodeError::UnsupportedEncoding {
                encoding: encoding.to_string(),
            })?;
        decoder.set_time_base(time_base);
        decoder.set_time_unit_multiplier(TIME_UNIT_MULTIPLIER);

        self.accumulator.initialize(width, height);
        self.state = SessionState::Configured;
        Ok(DecoderHandle {
            encoding: encoding.to_string(),
            width,
            height,
            time_base,
        })
    }

    /// Splits the session into the handle's decoder and the accumulator.
    ///
    /// Decoders are shared by all handles of one stream key, so the
    /// handle's time base and the session time unit are applied again.
    fn parts(
        &mut self,
        handle: &DecoderHandle,
    ) -> Result<(&mut dyn RawDecoder, &mut Accumulator)> {
        let decoder = self
            .registry
            .existing_instance(&handle.encoding, handle.width, handle.height)
            .ok_or_else(|| DecodeError::UnsupportedEncoding {
                encoding: handle.encoding.clone(),
            })?;
        decoder.set_time_base(handle.time_base);
        decoder.set_time_unit_multiplier(TIME_UNIT_MULTIPLIER);
        Ok((decoder, &mut self.accumulator))
    }

    /// Replaces the stored events with everything decoded from `buf`.
    ///
    /// On a decode error, events produced before the failure stay stored.
    pub fn decode_full(&mut self, handle: &DecoderHandle, buf: &[u8]) -> Result<()> {
        let (decoder, accumulator) = self.parts(handle)?;
        accumulator.reset_stored_events();
        decoder.decode(buf, accumulator)?;
        trace!(
            encoding = %handle.encoding,
            cd = accumulator.cd_len(),
            triggers = accumulator.trigger_len(),
            "decoded buffer"
        );
        Ok(())
    }

    /// Replaces the stored events with those decoded from `buf` before
    /// `until_time`.
    ///
    /// Events left unextracted from a previous decode are discarded.
    pub fn decode_until(
        &mut self,
        handle: &DecoderHandle,
        buf: &[u8],
        until_time: u64,
    ) -> Result<DecodeProgress> {
        let (decoder, accumulator) = self.parts(handle)?;
        accumulator.reset_stored_events();
        let progress = decoder.decode_until(buf, accumulator, until_time, handle.time_base)?;
        if progress.reached_limit {
            debug!(
                encoding = %handle.encoding,
                until_time,
                next_time = progress.next_time,
                "decode stopped at time limit"
            );
        }
        Ok(progress)
    }

    /// Configures the decoder for `packet` and decodes its whole payload.
    pub fn decode_packet(&mut self, packet: &EventPacket<'_>) -> Result<()> {
        let handle = self.resolve_and_configure(
            packet.encoding,
            packet.width,
            packet.height,
            packet.time_base,
        )?;
        self.decode_full(&handle, packet.events)
    }

    /// Configures the decoder for `packet` and decodes up to `until_time`.
    pub fn decode_packet_until(
        &mut self,
        packet: &EventPacket<'_>,
        until_time: u64,
    ) -> Result<DecodeProgress> {
        let handle = self.resolve_and_configure(
            packet.encoding,
            packet.width,
            packet.height,
            packet.time_base,
        )?;
        self.decode_until(&handle, packet.events, until_time)
    }

    /// Takes the decoded CD events. A second call returns an empty buffer.
    pub fn extract_cd_events(&mut self) -> Vec<CdEvent> {
        self.accumulator.extract_cd_events()
    }

    /// Takes the decoded trigger events. A second call returns an empty buffer.
    pub fn extract_ext_trigger_events(&mut self) -> Vec<TriggerEvent> {
        self.accumulator.extract_ext_trigger_events()
    }

    pub fn cd_off_count(&self) -> usize {
        self.accumulator.cd_off_count()
    }

    pub fn cd_on_count(&self) -> usize {
        self.accumulator.cd_on_count()
    }

    pub fn trigger_rising_count(&self) -> usize {
        self.accumulator.trigger_rising_count()
    }

    pub fn trigger_falling_count(&self) -> usize {
        self.accumulator.trigger_falling_count()
    }
}
