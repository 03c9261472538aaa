//! Electrochemical gas sensor: four cells behind one analog front end.
//!
//! Each cell's output voltage is converted with a per-species linear
//! calibration, `ppm = factor × (V − V_zero)`.  Channels are read and
//! recorded independently, so one bad cell does not hide the others.

use log::warn;

use crate::app::ports::{AnalogFrontEnd, SensorAdapter};
use crate::config::GasCalibration;
use crate::error::SensorError;
use crate::telemetry::{GasChannel, Measurement, Reading};

/// Convert a front-end voltage to a concentration in ppm.
pub fn concentration_ppm(cal: &GasCalibration, channel: GasChannel, volts: f32) -> f32 {
    cal.factor(channel) * (volts - cal.zero_volts)
}

pub fn co_ppm(cal: &GasCalibration, volts: f32) -> f32 {
    concentration_ppm(cal, GasChannel::Co, volts)
}

pub fn no2_ppm(cal: &GasCalibration, volts: f32) -> f32 {
    concentration_ppm(cal, GasChannel::No2, volts)
}

pub fn o3_ppm(cal: &GasCalibration, volts: f32) -> f32 {
    concentration_ppm(cal, GasChannel::O3, volts)
}

pub fn so2_ppm(cal: &GasCalibration, volts: f32) -> f32 {
    concentration_ppm(cal, GasChannel::So2, volts)
}

/// Sweep adapter for the gas cells.
pub struct GasSensor<A> {
    afe: A,
    cal: GasCalibration,
}

impl<A: AnalogFrontEnd> GasSensor<A> {
    pub fn new(afe: A, cal: GasCalibration) -> Self {
        Self { afe, cal }
    }

    pub fn set_calibration(&mut self, cal: GasCalibration) {
        self.cal = cal;
    }
}

impl<A: AnalogFrontEnd> SensorAdapter for GasSensor<A> {
    fn name(&self) -> &'static str {
        "ADS131M04"
    }

    fn init(&mut self) -> bool {
        self.afe.begin()
    }

    fn apply_calibration(&mut self, cal: &GasCalibration) {
        self.set_calibration(*cal);
    }

    /// Records every channel that reads cleanly.  Fails only when no
    /// channel could be read.
    fn read(&mut self, m: &mut Measurement) -> Result<(), SensorError> {
        let mut last_err = None;
        let mut any_ok = false;
        for channel in GasChannel::ALL {
            match self.afe.read_voltage(channel) {
                Ok(volts) => {
                    m.record(Reading::Gas(
                        channel,
                        concentration_ppm(&self.cal, channel, volts),
                    ));
                    any_ok = true;
                }
                Err(e) => {
                    warn!("GasSensor: {} channel read failed: {}", channel.name(), e);
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if !any_ok => Err(e),
            _ => Ok(()),
        }
    }
}
