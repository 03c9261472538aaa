//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC in production, stderr in the simulator).
//! A console or downlink adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as one line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::SensorAbsent(name) => {
                warn!("SENSOR | {} absent, skipped", name);
            }
            AppEvent::UplinkQueued {
                len,
                flags,
                confirmed,
            } => {
                info!(
                    "UPLINK | queued {} bytes | flags=0x{:04x} | confirmed={}",
                    len, flags, confirmed
                );
            }
            AppEvent::UplinkDone(Ok(())) => {
                info!("UPLINK | done");
            }
            AppEvent::UplinkDone(Err(e)) => {
                warn!("UPLINK | failed: {}", e);
            }
            AppEvent::SleepPlanned { mode, secs } => {
                info!("SLEEP | {:?} | {}s left in interval", mode, secs);
            }
            AppEvent::Woke { slept_secs } => {
                info!("SLEEP | woke after {}s", slept_secs);
            }
        }
    }
}
