//! Sensor subsystem: individual adapters and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor as a "maybe present" capability.  Presence is
//! decided once by [`SensorHub::init_all`]; absent sensors are skipped by
//! every later sweep.  A sensor that fails to come back after deep sleep is
//! marked absent the same way.
//!
//! The CO2 sensor is special: it samples on its own schedule, so the hub
//! polls it opportunistically between sweeps and caches the last value.

pub mod gas;
pub mod sim;

use log::{info, warn};

use crate::app::ports::{Co2Sensor, SensorAdapter, SleepBehavior};
use crate::config::GasCalibration;
use crate::error::SensorError;
use crate::telemetry::{Measurement, Reading};

/// One sweep-read sensor plus its presence bit.
struct Slot {
    adapter: Box<dyn SensorAdapter>,
    present: bool,
    suspended: bool,
}

/// The CO2 sensor plus its cached sample.
struct Co2Slot {
    sensor: Box<dyn Co2Sensor>,
    present: bool,
    suspended: bool,
    cached_ppm: Option<f32>,
}

/// Aggregates all sensors and runs the measurement sweep.
pub struct SensorHub {
    slots: Vec<Slot>,
    co2: Option<Co2Slot>,
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorHub {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            co2: None,
        }
    }

    /// Add a sweep-read sensor.  Sweep order follows insertion order.
    pub fn with_sensor(mut self, adapter: impl SensorAdapter + 'static) -> Self {
        self.slots.push(Slot {
            adapter: Box::new(adapter),
            present: false,
            suspended: false,
        });
        self
    }

    pub fn with_co2(mut self, sensor: impl Co2Sensor + 'static) -> Self {
        self.co2 = Some(Co2Slot {
            sensor: Box::new(sensor),
            present: false,
            suspended: false,
            cached_ppm: None,
        });
        self
    }

    /// Bring every sensor up and record which ones answered.  Returns the
    /// names of the absent ones.
    pub fn init_all(&mut self) -> Vec<&'static str> {
        let mut absent = Vec::new();
        for slot in &mut self.slots {
            slot.present = slot.adapter.init();
            if slot.present {
                info!("SensorHub: {} ready", slot.adapter.name());
            } else {
                warn!("SensorHub: no {} found, check wiring", slot.adapter.name());
                absent.push(slot.adapter.name());
            }
        }
        if let Some(co2) = &mut self.co2 {
            co2.present = co2.sensor.begin();
            if co2.present {
                info!("SensorHub: {} ready", CO2_NAME);
            } else {
                warn!("SensorHub: no {} found, begin failed", CO2_NAME);
                absent.push(CO2_NAME);
            }
        }
        absent
    }

    /// Hand a new gas calibration to every sensor.  Absent ones take it too,
    /// so a sensor that comes back later reads with the current values.
    pub fn apply_gas_calibration(&mut self, cal: &GasCalibration) {
        for slot in &mut self.slots {
            slot.adapter.apply_calibration(cal);
        }
    }

    /// Whether the named sensor is present.
    pub fn is_present(&self, name: &str) -> bool {
        if name == CO2_NAME {
            return self.co2.as_ref().is_some_and(|c| c.present);
        }
        self.slots
            .iter()
            .any(|s| s.present && s.adapter.name() == name)
    }

    // ── CO2 ───────────────────────────────────────────────────

    /// Opportunistic CO2 sample.  When the sensor's next sample is due
    /// within `window_ms`, query it without blocking and cache any result.
    pub fn poll_co2(&mut self, window_ms: u32) {
        let Some(co2) = &mut self.co2 else {
            return;
        };
        if !co2.present || co2.suspended {
            return;
        }
        if co2.sensor.ms_to_next_measurement() >= window_ms {
            return;
        }
        match co2.sensor.query_ready() {
            Ok(true) => match co2.sensor.read_measurement() {
                Ok(sample) => {
                    log::debug!(
                        "SensorHub: CO2 {:.0} ppm (T {:.2} C, RH {:.2} %)",
                        sample.co2_ppm,
                        sample.temperature_c,
                        sample.humidity
                    );
                    co2.cached_ppm = Some(sample.co2_ppm);
                }
                Err(e) => warn!("SensorHub: CO2 measurement failed: {}", e),
            },
            Ok(false) => {}
            Err(e) => warn!("SensorHub: CO2 ready query failed: {}", e),
        }
    }

    /// Cached CO2 value, if any, without consuming it.
    pub fn cached_co2(&self) -> Option<f32> {
        self.co2.as_ref().and_then(|c| c.cached_ppm)
    }

    // ── Sweep ─────────────────────────────────────────────────

    /// Read every present sensor into `m`.  A failing sensor leaves its
    /// flags clear and the sweep continues.  Returns how many sensors
    /// reported an error.
    pub fn sweep(&mut self, m: &mut Measurement) -> usize {
        let mut failures = 0;

        if let Some(ppm) = self.co2.as_mut().and_then(|c| c.cached_ppm.take()) {
            m.record(Reading::Co2(ppm));
        }

        for slot in self.slots.iter_mut().filter(|s| s.present) {
            if let Err(e) = slot.adapter.read(m) {
                failures += 1;
                report_read_error(slot.adapter.name(), e);
            }
        }
        failures
    }

    // ── Deep sleep ────────────────────────────────────────────

    /// Shut down the sensors that lose state across deep sleep.
    pub fn prepare_deep_sleep(&mut self) {
        if let Some(co2) = self.co2.as_mut().filter(|c| c.present) {
            co2.sensor.end();
            co2.suspended = true;
        }
        for slot in &mut self.slots {
            if slot.present && slot.adapter.sleep_behavior() == SleepBehavior::Reinitialize {
                slot.adapter.shutdown();
                slot.suspended = true;
            }
        }
    }

    /// Re-initialise whatever `prepare_deep_sleep` shut down.  Sensors that
    /// fail to come back are marked absent; their names are returned.
    pub fn recover_from_deep_sleep(&mut self) -> Vec<&'static str> {
        let mut lost = Vec::new();
        if let Some(co2) = self.co2.as_mut().filter(|c| c.suspended) {
            co2.suspended = false;
            co2.present = co2.sensor.begin();
            if !co2.present {
                warn!("SensorHub: {} begin() failed after sleep", CO2_NAME);
                co2.cached_ppm = None;
                lost.push(CO2_NAME);
            }
        }
        for slot in self.slots.iter_mut().filter(|s| s.suspended) {
            slot.suspended = false;
            slot.present = slot.adapter.init();
            if !slot.present {
                warn!("SensorHub: {} init failed after sleep", slot.adapter.name());
                lost.push(slot.adapter.name());
            }
        }
        lost
    }
}

/// Name used for the CO2 sensor in diagnostics and events.
pub const CO2_NAME: &str = "SCD30";

fn report_read_error(name: &str, e: SensorError) {
    warn!("SensorHub: {} read failed: {}", name, e);
}
