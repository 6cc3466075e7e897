//! Prophesee EVT 3.0 codec.
//!
//! EVT 3.0 is a stream of little-endian 16-bit words. Timestamps are
//! absolute sensor microseconds split over TIME_HIGH / TIME_LOW words; pixel
//! addresses are split over ADDR_Y / ADDR_X or vectorized with VECT_BASE_X
//! and VECT_12 / VECT_8 validity masks.

mod decoder;
mod encoder;
pub mod parser;

pub use decoder::Evt3Decoder;
pub use encoder::Evt3Encoder;
