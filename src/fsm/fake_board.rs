//! Scriptable board for unit tests.  The clock only moves when a test
//! advances it or when the code under test delays or sleeps.

use std::cell::Cell;

use embedded_hal::delay::DelayNs;

use crate::app::ports::{IndicatorPort, PlatformPort, PowerPort, UplinkPort};
use crate::drivers::led_patterns::LedPattern;
use crate::error::{SensorError, TransmitError};

pub struct FakeBoard {
    now_ns: u64,
    pub provisioned: bool,
    pub launch: Result<(), TransmitError>,
    /// Outcome reported for every launched send; `None` leaves it pending.
    pub outcome: Option<bool>,
    completion: Option<bool>,
    pub sent: Vec<(Vec<u8>, bool)>,
    pub led: LedPattern,
    pub debug_link: bool,
    /// How often the sleep policy asked about the debug link.
    pub debug_link_checks: Cell<u32>,
    pub vbat: Result<f32, SensorError>,
    pub vbus: f32,
    pub boot: Option<u32>,
    pub deep_sleeps: Vec<u32>,
    pub suspended: bool,
}

impl FakeBoard {
    pub fn new() -> Self {
        Self {
            now_ns: 0,
            provisioned: true,
            launch: Ok(()),
            outcome: Some(true),
            completion: None,
            sent: Vec::new(),
            led: LedPattern::Off,
            debug_link: false,
            debug_link_checks: Cell::new(0),
            vbat: Err(SensorError::Absent),
            vbus: 0.0,
            boot: None,
            deep_sleeps: Vec::new(),
            suspended: false,
        }
    }

    pub fn advance_ms(&mut self, ms: u32) {
        self.now_ns += u64::from(ms) * 1_000_000;
    }
}

impl DelayNs for FakeBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns += u64::from(ns);
    }
}

impl PowerPort for FakeBoard {
    fn now_millis(&self) -> u32 {
        (self.now_ns / 1_000_000) as u32
    }

    fn sleep_for(&mut self, secs: u32) {
        self.deep_sleeps.push(secs);
        self.advance_ms(secs * 1_000);
    }

    fn debug_link_active(&self) -> bool {
        self.debug_link_checks.set(self.debug_link_checks.get() + 1);
        self.debug_link
    }

    fn suspend_peripherals(&mut self) {
        self.suspended = true;
    }

    fn resume_peripherals(&mut self) {
        self.suspended = false;
    }
}

impl PlatformPort for FakeBoard {
    fn read_vbat(&mut self) -> Result<f32, SensorError> {
        self.vbat
    }

    fn read_vbus(&mut self) -> f32 {
        self.vbus
    }

    fn read_vsystem(&mut self) -> f32 {
        3.3
    }

    fn boot_count(&self) -> Option<u32> {
        self.boot
    }
}

impl IndicatorPort for FakeBoard {
    fn set_pattern(&mut self, pattern: LedPattern) -> LedPattern {
        core::mem::replace(&mut self.led, pattern)
    }
}

impl UplinkPort for FakeBoard {
    fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    fn send(&mut self, payload: &[u8], confirmed: bool) -> Result<(), TransmitError> {
        self.launch?;
        self.sent.push((payload.to_vec(), confirmed));
        self.completion = self.outcome;
        Ok(())
    }

    fn take_completion(&mut self) -> Option<bool> {
        self.completion.take()
    }
}
