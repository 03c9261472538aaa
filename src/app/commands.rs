//! Inbound commands to the measurement loop.
//!
//! These represent actions requested by the outside world (debug console,
//! provisioning, a downlink handler) that the
//! [`MeasurementLoop`](super::service::MeasurementLoop) interprets.

use crate::config::{OperatingFlags, SystemConfig};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Start measuring.  Honoured from `Inactive`.
    Activate,

    /// Stop measuring.  Honoured from `Inactive` and `Sleeping`.
    Deactivate,

    /// Change the uplink period (seconds) and the number of cycles before
    /// it reverts to the permanent period.
    SetTxCycle { secs: u32, count: u32 },

    /// Replace the operating flags.
    SetOperatingFlags(OperatingFlags),

    /// Hot-reload configuration.  Rejected if it fails validation.
    UpdateConfig(SystemConfig),

    /// Stop the loop for good.
    Stop,
}
