//! Outbound application events.
//!
//! The [`MeasurementLoop`](super::service::MeasurementLoop) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log to serial, forward to a
//! console, count them in a test.

use crate::error::TransmitError;
use crate::fsm::StateId;
use crate::power::SleepMode;

/// Structured events emitted by the measurement loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The loop has started (carries the state it settled in).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A sensor did not answer at init or after deep sleep and is skipped
    /// from now on.
    SensorAbsent(&'static str),

    /// An uplink was handed to the transport.
    UplinkQueued { len: usize, flags: u16, confirmed: bool },

    /// An uplink finished.  `Err` covers both launch and delivery failure.
    UplinkDone(Result<(), TransmitError>),

    /// A sleep episode is starting.
    SleepPlanned { mode: SleepMode, secs: u32 },

    /// Back from deep sleep.
    Woke { slept_secs: u32 },
}
