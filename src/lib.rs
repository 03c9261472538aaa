//! Multigas node firmware library.
//!
//! The measurement-and-uplink core of a battery-powered multigas sensor
//! node: the measurement state machine, the sleep/power policy, the 0x27
//! uplink encoder and the gas conversion helpers.  Exposed as a library for
//! integration testing and the host simulator.  All ESP-IDF-specific code
//! is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod bits;
pub mod config;
pub mod error;
pub mod fsm;
pub mod power;
pub mod telemetry;
pub mod timer;

pub mod pins;

// Board-facing modules; the ESP-IDF implementations are guarded by cfg
// attributes inside, the host builds get simulation backends.
pub mod adapters;
pub mod drivers;
pub mod sensors;
