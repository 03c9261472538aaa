//! Unified error types for the multigas node.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! measurement loop's error handling uniform.  All variants are `Copy` so
//! they can be carried through the sensor sweep and the FSM context without
//! allocation.  None of them is ever propagated out of `poll()`: the loop
//! reduces every failure to "skip this field" or "skip this cycle" and logs
//! the error text.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level node error
// ---------------------------------------------------------------------------

/// Every fallible operation in the node funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned out-of-range data.
    Sensor(SensorError),
    /// The uplink transport refused or failed a send.
    Transmit(TransmitError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Transmit(e) => write!(f, "transmit: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Transient sensor failures.  A read error leaves the field's flag clear for
/// the current cycle; the next cycle retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus transaction (I2C/SPI) failed or timed out.
    BusError,
    /// The device answered but reported an internal error.
    DeviceError,
    /// No new sample is available yet.
    NotReady,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// The sensor is not present (detected at init or lost after sleep).
    Absent,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusError => write!(f, "bus error"),
            Self::DeviceError => write!(f, "device error"),
            Self::NotReady => write!(f, "data not ready"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Absent => write!(f, "sensor absent"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Transmit errors
// ---------------------------------------------------------------------------

/// Uplink launch failures.  The loop treats every variant like a send that
/// completed with an error, except that [`TransmitError::NotProvisioned`] is
/// also visible through `UplinkPort::is_provisioned()` and parks the FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    /// The network stack has no session identity.
    NotProvisioned,
    /// Another uplink is still in flight.
    Busy,
    /// The stack rejected the buffer (too long, duty-cycle limit, ...).
    Rejected,
    /// The send was launched but not delivered.
    NotDelivered,
}

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotProvisioned => write!(f, "network not provisioned"),
            Self::Busy => write!(f, "uplink busy"),
            Self::Rejected => write!(f, "uplink rejected"),
            Self::NotDelivered => write!(f, "uplink not delivered"),
        }
    }
}

impl From<TransmitError> for Error {
    fn from(e: TransmitError) -> Self {
        Self::Transmit(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Node-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
