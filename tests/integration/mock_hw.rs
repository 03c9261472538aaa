//! Mock board and sinks for integration tests.
//!
//! The clock only moves when a test advances it or when the code under
//! test delays or sleeps, so every timing path is deterministic.  Every
//! uplink and deep sleep is recorded for later assertions.

use std::cell::RefCell;

use embedded_hal::delay::DelayNs;
use multigas_node::app::events::AppEvent;
use multigas_node::app::ports::{
    ConfigError, ConfigPort, EventSink, IndicatorPort, PlatformPort, PowerPort, UplinkPort,
};
use multigas_node::app::service::MeasurementLoop;
use multigas_node::config::SystemConfig;
use multigas_node::drivers::led_patterns::LedPattern;
use multigas_node::error::{SensorError, TransmitError};
use multigas_node::sensors::SensorHub;

// ── Uplink record ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SentFrame {
    pub payload: Vec<u8>,
    pub confirmed: bool,
    pub at_ms: u32,
}

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    now_ns: u64,
    pub provisioned: bool,
    /// Result of every `send` launch.
    pub launch: Result<(), TransmitError>,
    /// Outcome reported after each launched send; `None` leaves it pending.
    pub outcome: Option<bool>,
    completion: Option<bool>,
    pub sent: Vec<SentFrame>,
    pub patterns: Vec<LedPattern>,
    pub debug_link: bool,
    pub vbat: Result<f32, SensorError>,
    pub vbus: f32,
    pub boot: Option<u32>,
    pub deep_sleeps: Vec<u32>,
    pub suspend_calls: u32,
    pub resume_calls: u32,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            now_ns: 0,
            provisioned: true,
            launch: Ok(()),
            outcome: Some(true),
            completion: None,
            sent: Vec::new(),
            patterns: vec![LedPattern::Off],
            debug_link: false,
            vbat: Err(SensorError::Absent),
            vbus: 0.0,
            boot: None,
            deep_sleeps: Vec::new(),
            suspend_calls: 0,
            resume_calls: 0,
        }
    }

    pub fn advance_ms(&mut self, ms: u32) {
        self.now_ns += u64::from(ms) * 1_000_000;
    }

    pub fn led(&self) -> LedPattern {
        self.patterns.last().copied().unwrap_or(LedPattern::Off)
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.sent.iter().map(|f| f.payload.clone()).collect()
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for MockBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns += u64::from(ns);
    }
}

impl PowerPort for MockBoard {
    fn now_millis(&self) -> u32 {
        (self.now_ns / 1_000_000) as u32
    }

    fn sleep_for(&mut self, secs: u32) {
        self.deep_sleeps.push(secs);
        self.advance_ms(secs * 1_000);
    }

    fn debug_link_active(&self) -> bool {
        self.debug_link
    }

    fn suspend_peripherals(&mut self) {
        self.suspend_calls += 1;
    }

    fn resume_peripherals(&mut self) {
        self.resume_calls += 1;
    }
}

impl PlatformPort for MockBoard {
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

impl IndicatorPort for MockBoard {
    fn set_pattern(&mut self, pattern: LedPattern) -> LedPattern {
        let previous = self.led();
        self.patterns.push(pattern);
        previous
    }
}

impl UplinkPort for MockBoard {
    fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    fn send(&mut self, payload: &[u8], confirmed: bool) -> Result<(), TransmitError> {
        self.launch?;
        let at_ms = self.now_millis();
        self.sent.push(SentFrame {
            payload: payload.to_vec(),
            confirmed,
            at_ms,
        });
        self.completion = self.outcome;
        Ok(())
    }

    fn take_completion(&mut self) -> Option<bool> {
        self.completion.take()
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── In-memory config store ────────────────────────────────────

#[derive(Default)]
pub struct MockConfigStore {
    pub saved: RefCell<Option<SystemConfig>>,
    pub saves: RefCell<u32>,
}

impl ConfigPort for MockConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        self.saved.borrow().clone().ok_or(ConfigError::NotFound)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.saved.borrow_mut() = Some(config.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Build and start a loop on a fresh mock board.
pub fn started_loop(
    config: SystemConfig,
    sensors: SensorHub,
) -> (MeasurementLoop<MockBoard>, RecordingSink) {
    let mut app = MeasurementLoop::new(config, MockBoard::new(), sensors);
    let mut sink = RecordingSink::new();
    app.begin(&mut sink);
    (app, sink)
}

/// Advance the mock clock by `ms` and poll once.
#[allow(dead_code)]
pub fn step(app: &mut MeasurementLoop<MockBoard>, sink: &mut RecordingSink, ms: u32) {
    app.board_mut().advance_ms(ms);
    app.poll(sink);
}
