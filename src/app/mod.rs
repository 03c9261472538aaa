//! Application core: pure domain logic, zero direct I/O.
//!
//! This module contains the business rules for the multigas node: the
//! measurement loop that drives the FSM, reacts to timer and transport
//! events, and paces uplinks.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
