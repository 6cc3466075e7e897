//! Decode sessions for event camera packets.
//!
//! Event camera drivers ship events as encoded packets (`evt3`, `mono`, ...)
//! carrying an encoding name, the sensor geometry and a time base. This crate
//! decodes such packets into two record buffers, change detection (CD)
//! events and external trigger events, and hands those buffers to the caller
//! by move.
//!
//! # Example
//!
//! ```
//! use evcam_core::codec::Evt3Encoder;
//! use evcam_core::{EventPacket, Session};
//!
//! let mut encoder = Evt3Encoder::new();
//! encoder.encode_cd(10, 1, 2, 1);
//! encoder.encode_trigger(20, 1, 0);
//! let payload = encoder.finish();
//!
//! let mut session = Session::new();
//! session
//!     .decode_packet(&EventPacket {
//!         encoding: "evt3",
//!         width: 640,
//!         height: 480,
//!         time_base: 0,
//!         events: &payload,
//!     })
//!     .unwrap();
//!
//! let cd = session.extract_cd_events();
//! let triggers = session.extract_ext_trigger_events();
//! println!("{} CD events, {} triggers", cd.len(), triggers.len());
//! ```
//!
//! # Features
//!
//! - Stateful decoders cached per stream, so packets of one stream can be
//!   decoded one after another
//! - Time-bounded decoding for synchronizing several streams
//! - Lifetime counters of ON / OFF events and rising / falling trigger edges
//! - `#[repr(C)]` records, so extracted buffers can be handed to foreign
//!   array types as they are

pub mod accumulator;
pub mod codec;
pub mod error;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use accumulator::Accumulator;
pub use codec::{DecoderRegistry, EventSink, RawDecoder};
pub use error::DecodeError;
pub use session::{DecoderHandle, Session, SessionState};
pub use types::{CdEvent, DecodeParams, DecodeProgress, EventPacket, TriggerEvent};
