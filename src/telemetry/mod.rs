//! Measurement snapshot and the uplink wire format.
//!
//! The snapshot ([`Measurement`]) accumulates one cycle of readings, the
//! encoder ([`fill_tx_buffer`]) turns it into an [`UplinkBuffer`].

pub mod buffer;
pub mod encoder;
pub mod flags;
pub mod float16;
pub mod measurement;

pub use buffer::UplinkBuffer;
pub use encoder::{FORMAT_TAG, fill_tx_buffer};
pub use flags::MeasurementFlags;
pub use measurement::{
    Environment, GasChannel, GasConcentrations, Measurement, Particulate, Position, Reading,
};
