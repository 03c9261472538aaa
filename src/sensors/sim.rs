//! Simulated sensors for the host build and tests.
//!
//! Each simulated sensor shares its state with a cloneable handle, so a test
//! or the simulator loop can change readings, inject failures, and inspect
//! calls after the sensor has been moved into the [`SensorHub`](super::SensorHub).

use std::cell::RefCell;
use std::rc::Rc;

use crate::app::ports::{AnalogFrontEnd, Co2Sample, Co2Sensor, SensorAdapter, SleepBehavior};
use crate::error::SensorError;
use crate::telemetry::measurement::PM_BINS;
use crate::telemetry::{Environment, GasChannel, Measurement, Particulate, Position, Reading};

/// Shared fault-injection state common to every simulated device.
#[derive(Debug, Default)]
struct Faults {
    absent: bool,
    fail_next: Option<SensorError>,
    fail_always: Option<SensorError>,
    init_calls: u32,
    shutdown_calls: u32,
}

impl Faults {
    fn take_error(&mut self) -> Option<SensorError> {
        self.fail_next.take().or(self.fail_always)
    }
}

macro_rules! fault_handle_methods {
    () => {
        /// Make the next read fail with `e`.
        pub fn fail_next(&self, e: SensorError) {
            self.0.borrow_mut().faults.fail_next = Some(e);
        }

        /// Make every read fail with `e`, or stop failing with `None`.
        pub fn fail_always(&self, e: Option<SensorError>) {
            self.0.borrow_mut().faults.fail_always = e;
        }

        /// Whether the next `init` reports the device as fitted.
        pub fn set_present(&self, present: bool) {
            self.0.borrow_mut().faults.absent = !present;
        }

        pub fn init_calls(&self) -> u32 {
            self.0.borrow().faults.init_calls
        }

        pub fn shutdown_calls(&self) -> u32 {
            self.0.borrow().faults.shutdown_calls
        }
    };
}

// ───────────────────────────────────────────────────────────────
// Temperature / humidity (SHT3x)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ThState {
    env: Environment,
    faults: Faults,
}

/// Simulated SHT3x temperature/humidity sensor.
pub struct SimThSensor(Rc<RefCell<ThState>>);

/// Control handle for a [`SimThSensor`].
#[derive(Clone)]
pub struct SimThHandle(Rc<RefCell<ThState>>);

impl SimThSensor {
    pub fn new(temperature_c: f32, humidity: f32) -> Self {
        Self(Rc::new(RefCell::new(ThState {
            env: Environment {
                temperature_c,
                humidity,
            },
            faults: Faults::default(),
        })))
    }

    pub fn absent() -> Self {
        let s = Self::new(0.0, 0.0);
        s.0.borrow_mut().faults.absent = true;
        s
    }

    pub fn handle(&self) -> SimThHandle {
        SimThHandle(Rc::clone(&self.0))
    }
}

impl SimThHandle {
    pub fn set(&self, temperature_c: f32, humidity: f32) {
        self.0.borrow_mut().env = Environment {
            temperature_c,
            humidity,
        };
    }

    fault_handle_methods!();
}

impl SensorAdapter for SimThSensor {
    fn name(&self) -> &'static str {
        "SHT3x"
    }

    fn init(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        s.faults.init_calls += 1;
        !s.faults.absent
    }

    fn read(&mut self, m: &mut Measurement) -> Result<(), SensorError> {
        let mut s = self.0.borrow_mut();
        if let Some(e) = s.faults.take_error() {
            return Err(e);
        }
        m.record(Reading::Environment(s.env));
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// CO2 (SCD30)
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Co2State {
    sample: Co2Sample,
    ms_to_next: u32,
    ready: bool,
    begin_ok: bool,
    ended: bool,
    faults: Faults,
}

/// Simulated SCD30 CO2 sensor.  Always has a fresh sample unless told
/// otherwise.
pub struct SimCo2(Rc<RefCell<Co2State>>);

/// Control handle for a [`SimCo2`].
#[derive(Clone)]
pub struct SimCo2Handle(Rc<RefCell<Co2State>>);

impl SimCo2 {
    pub fn new(co2_ppm: f32) -> Self {
        Self(Rc::new(RefCell::new(Co2State {
            sample: Co2Sample {
                co2_ppm,
                temperature_c: 22.0,
                humidity: 45.0,
            },
            ms_to_next: 0,
            ready: true,
            begin_ok: true,
            ended: false,
            faults: Faults::default(),
        })))
    }

    pub fn handle(&self) -> SimCo2Handle {
        SimCo2Handle(Rc::clone(&self.0))
    }
}

impl SimCo2Handle {
    pub fn set_ppm(&self, co2_ppm: f32) {
        self.0.borrow_mut().sample.co2_ppm = co2_ppm;
    }

    pub fn set_ms_to_next(&self, ms: u32) {
        self.0.borrow_mut().ms_to_next = ms;
    }

    pub fn set_ready(&self, ready: bool) {
        self.0.borrow_mut().ready = ready;
    }

    /// Whether the next `begin` succeeds.
    pub fn set_begin_ok(&self, ok: bool) {
        self.0.borrow_mut().begin_ok = ok;
    }

    /// `true` between `end()` and the next `begin()`.
    pub fn is_ended(&self) -> bool {
        self.0.borrow().ended
    }

    fault_handle_methods!();
}

impl Co2Sensor for SimCo2 {
    fn begin(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        s.faults.init_calls += 1;
        s.ended = false;
        s.begin_ok && !s.faults.absent
    }

    fn ms_to_next_measurement(&self) -> u32 {
        self.0.borrow().ms_to_next
    }

    fn query_ready(&mut self) -> Result<bool, SensorError> {
        let s = self.0.borrow();
        if s.ended {
            return Err(SensorError::NotReady);
        }
        Ok(s.ready)
    }

    fn read_measurement(&mut self) -> Result<Co2Sample, SensorError> {
        let mut s = self.0.borrow_mut();
        if let Some(e) = s.faults.take_error() {
            return Err(e);
        }
        Ok(s.sample)
    }

    fn end(&mut self) {
        let mut s = self.0.borrow_mut();
        s.faults.shutdown_calls += 1;
        s.ended = true;
    }
}

// ───────────────────────────────────────────────────────────────
// Particulate (IPS-7100)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PmState {
    pm: Particulate,
    faults: Faults,
}

/// Simulated IPS-7100 particle counter.  Loses state in deep sleep.
pub struct SimParticulate(Rc<RefCell<PmState>>);

/// Control handle for a [`SimParticulate`].
#[derive(Clone)]
pub struct SimParticulateHandle(Rc<RefCell<PmState>>);

impl SimParticulate {
    pub fn new(mass: [f32; PM_BINS], count: [u32; PM_BINS]) -> Self {
        Self(Rc::new(RefCell::new(PmState {
            pm: Particulate { mass, count },
            faults: Faults::default(),
        })))
    }

    pub fn handle(&self) -> SimParticulateHandle {
        SimParticulateHandle(Rc::clone(&self.0))
    }
}

impl SimParticulateHandle {
    pub fn set(&self, mass: [f32; PM_BINS], count: [u32; PM_BINS]) {
        self.0.borrow_mut().pm = Particulate { mass, count };
    }

    fault_handle_methods!();
}

impl SensorAdapter for SimParticulate {
    fn name(&self) -> &'static str {
        "IPS-7100"
    }

    fn init(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        s.faults.init_calls += 1;
        !s.faults.absent
    }

    fn read(&mut self, m: &mut Measurement) -> Result<(), SensorError> {
        let mut s = self.0.borrow_mut();
        if let Some(e) = s.faults.take_error() {
            return Err(e);
        }
        m.record(Reading::Particulate(s.pm));
        Ok(())
    }

    fn sleep_behavior(&self) -> SleepBehavior {
        SleepBehavior::Reinitialize
    }

    fn shutdown(&mut self) {
        self.0.borrow_mut().faults.shutdown_calls += 1;
    }
}

// ───────────────────────────────────────────────────────────────
// Gas analog front end (ADS131M04)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct AfeState {
    volts: [f32; 4],
    channel_errors: [Option<SensorError>; 4],
    begin_fails: bool,
}

/// Simulated four-channel ADC.
pub struct SimAnalogFrontEnd(Rc<RefCell<AfeState>>);

/// Control handle for a [`SimAnalogFrontEnd`].
#[derive(Clone)]
pub struct SimAnalogFrontEndHandle(Rc<RefCell<AfeState>>);

impl SimAnalogFrontEnd {
    /// Every channel starts at `volts`.
    pub fn new(volts: f32) -> Self {
        Self(Rc::new(RefCell::new(AfeState {
            volts: [volts; 4],
            ..AfeState::default()
        })))
    }

    pub fn handle(&self) -> SimAnalogFrontEndHandle {
        SimAnalogFrontEndHandle(Rc::clone(&self.0))
    }
}

impl SimAnalogFrontEndHandle {
    pub fn set_voltage(&self, channel: GasChannel, volts: f32) {
        self.0.borrow_mut().volts[channel as usize] = volts;
    }

    /// Make every read of `channel` fail with `e`, or recover with `None`.
    pub fn set_channel_error(&self, channel: GasChannel, e: Option<SensorError>) {
        self.0.borrow_mut().channel_errors[channel as usize] = e;
    }

    pub fn set_begin_fails(&self, fails: bool) {
        self.0.borrow_mut().begin_fails = fails;
    }
}

impl AnalogFrontEnd for SimAnalogFrontEnd {
    fn begin(&mut self) -> bool {
        !self.0.borrow().begin_fails
    }

    fn read_voltage(&mut self, channel: GasChannel) -> Result<f32, SensorError> {
        let s = self.0.borrow();
        match s.channel_errors[channel as usize] {
            Some(e) => Err(e),
            None => Ok(s.volts[channel as usize]),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// GNSS (SAM-M8Q)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct GpsState {
    fix: Option<Position>,
    faults: Faults,
}

/// Simulated GNSS receiver.  Reports `NotReady` until it has a fix.
pub struct SimGps(Rc<RefCell<GpsState>>);

/// Control handle for a [`SimGps`].
#[derive(Clone)]
pub struct SimGpsHandle(Rc<RefCell<GpsState>>);

impl SimGps {
    pub fn new(fix: Option<Position>) -> Self {
        Self(Rc::new(RefCell::new(GpsState {
            fix,
            faults: Faults::default(),
        })))
    }

    pub fn handle(&self) -> SimGpsHandle {
        SimGpsHandle(Rc::clone(&self.0))
    }
}

impl SimGpsHandle {
    pub fn set_fix(&self, fix: Option<Position>) {
        self.0.borrow_mut().fix = fix;
    }

    fault_handle_methods!();
}

impl SensorAdapter for SimGps {
    fn name(&self) -> &'static str {
        "SAM-M8Q"
    }

    fn init(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        s.faults.init_calls += 1;
        !s.faults.absent
    }

    fn read(&mut self, m: &mut Measurement) -> Result<(), SensorError> {
        let mut s = self.0.borrow_mut();
        if let Some(e) = s.faults.take_error() {
            return Err(e);
        }
        let fix = s.fix.ok_or(SensorError::NotReady)?;
        m.record(Reading::Position(fix));
        Ok(())
    }
}
