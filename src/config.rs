//! System configuration parameters
//!
//! All tunable parameters for the multigas node.  Defaults are the values
//! the node ships with; they can be overridden from NVS, from a JSON file on
//! the simulator, or at runtime through `AppCommand::UpdateConfig`.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::telemetry::GasChannel;

crate::bits::bit_set! {
    /// How the node is allowed to operate.  Set by provisioning or the
    /// debug console; read on every sleep decision and uplink.
    pub struct OperatingFlags(u32) {
        /// Deployed in the field; deep sleep allowed when nobody is watching.
        const UNATTENDED = 1 << 0;
        /// Factory test mode.
        const MANUFACTURING_TEST = 1 << 1;
        /// Ask the network for an acknowledgement on each uplink.
        const CONFIRMED_UPLINK = 1 << 16;
        /// Never deep sleep.
        const DISABLE_DEEP_SLEEP = 1 << 17;
        /// Shorter idle period between polls.
        const QUICK_LIGHT_SLEEP = 1 << 18;
        /// Force deep sleep even with a debug link, with a short alert.
        const DEEP_SLEEP_TEST = 1 << 19;
    }
}

crate::bits::bit_set! {
    /// Diagnostic text levels.  These gate log output only, never control
    /// flow.
    pub struct DebugFlags(u32) {
        const ERROR = 1 << 0;
        const WARNING = 1 << 1;
        const TRACE = 1 << 2;
        const INFO = 1 << 3;
    }
}

// ---------------------------------------------------------------------------
// Gas calibration
// ---------------------------------------------------------------------------

/// Linear calibration of the electrochemical gas channels:
/// `ppm = factor × (volts − zero_volts)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasCalibration {
    /// Front-end output at zero concentration (V).
    pub zero_volts: f32,
    pub co_ppm_per_volt: f32,
    pub no2_ppm_per_volt: f32,
    pub o3_ppm_per_volt: f32,
    pub so2_ppm_per_volt: f32,
}

impl Default for GasCalibration {
    fn default() -> Self {
        Self {
            zero_volts: 1.65,
            co_ppm_per_volt: 1.0 / 0.000_427,
            no2_ppm_per_volt: 1.0 / -0.015_354_23,
            o3_ppm_per_volt: 1.0 / -0.014_979_98,
            so2_ppm_per_volt: 1.0 / 0.002_86,
        }
    }
}

impl GasCalibration {
    pub fn factor(&self, channel: GasChannel) -> f32 {
        match channel {
            GasChannel::Co => self.co_ppm_per_volt,
            GasChannel::No2 => self.no2_ppm_per_volt,
            GasChannel::O3 => self.o3_ppm_per_volt,
            GasChannel::So2 => self.so2_ppm_per_volt,
        }
    }

    fn is_finite(&self) -> bool {
        [
            self.zero_volts,
            self.co_ppm_per_volt,
            self.no2_ppm_per_volt,
            self.o3_ppm_per_volt,
            self.so2_ppm_per_volt,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// SystemConfig
// ---------------------------------------------------------------------------

/// Longest uplink period the millisecond clock can express (seconds).
pub const MAX_TX_CYCLE_SECS: u32 = u32::MAX / 1_000;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Uplink cadence ---
    /// Initial ("fast") uplink period after activation (seconds)
    pub tx_cycle_secs: u32,
    /// Number of fast uplinks before reverting to the permanent period
    pub tx_cycle_count: u32,
    /// Steady-state uplink period (seconds)
    pub tx_cycle_permanent_secs: u32,

    // --- State timing ---
    /// Sensor settle time between activation and the first measurement (seconds)
    pub warmup_secs: u32,
    /// Minimum remaining interval before a sleep episode is attempted (ms)
    pub sleep_threshold_ms: u32,
    /// Deep sleep is never chosen with less than this much interval left (seconds)
    pub deep_sleep_min_secs: u32,
    /// Countdown shown before deep sleep (seconds)
    pub deep_sleep_alert_secs: u32,
    /// Countdown before deep sleep under `DEEP_SLEEP_TEST` (seconds)
    pub deep_sleep_test_alert_secs: u32,
    /// Pause after the countdown, before peripherals are shut down (ms)
    pub deep_sleep_settle_ms: u32,

    // --- Sampling ---
    /// Poll the CO2 sensor when its next sample is due within this window (ms)
    pub co2_ready_window_ms: u32,
    /// Bus voltage above which the node is on external power (V)
    pub external_power_threshold_v: f32,
    /// Gas channel calibration
    pub gas: GasCalibration,

    // --- Idle pacing ---
    /// Suggested idle between polls (ms)
    pub light_sleep_ms: u32,
    /// Suggested idle between polls under `QUICK_LIGHT_SLEEP` (ms)
    pub quick_light_sleep_ms: u32,

    // --- Modes ---
    pub operating_flags: OperatingFlags,
    pub debug_flags: DebugFlags,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Uplink cadence
            tx_cycle_secs: 30,
            tx_cycle_count: 10,
            tx_cycle_permanent_secs: 6 * 60,

            // State timing
            warmup_secs: 5,
            sleep_threshold_ms: 1_500,
            deep_sleep_min_secs: 2,
            deep_sleep_alert_secs: 30,
            deep_sleep_test_alert_secs: 10,
            deep_sleep_settle_ms: 100,

            // Sampling
            co2_ready_window_ms: 20,
            external_power_threshold_v: 4.0,
            gas: GasCalibration::default(),

            // Idle pacing
            light_sleep_ms: 100,
            quick_light_sleep_ms: 10,

            // Modes
            operating_flags: OperatingFlags::empty(),
            debug_flags: DebugFlags::ERROR | DebugFlags::TRACE,
        }
    }
}

impl SystemConfig {
    /// Reject values the measurement loop cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.tx_cycle_secs == 0 {
            return Err(Error::Config("tx_cycle_secs must be non-zero"));
        }
        if self.tx_cycle_permanent_secs == 0 {
            return Err(Error::Config("tx_cycle_permanent_secs must be non-zero"));
        }
        if self.tx_cycle_permanent_secs < self.tx_cycle_secs {
            return Err(Error::Config(
                "tx_cycle_permanent_secs shorter than tx_cycle_secs",
            ));
        }
        if self.tx_cycle_secs > MAX_TX_CYCLE_SECS
            || self.tx_cycle_permanent_secs > MAX_TX_CYCLE_SECS
        {
            return Err(Error::Config("uplink period overflows the millisecond clock"));
        }
        if self.warmup_secs == 0 {
            return Err(Error::Config("warmup_secs must be non-zero"));
        }
        if !self.gas.is_finite() {
            return Err(Error::Config("gas calibration must be finite"));
        }
        if !self.external_power_threshold_v.is_finite() {
            return Err(Error::Config("external_power_threshold_v must be finite"));
        }
        Ok(())
    }

    /// Idle time the outer loop should wait between polls.
    pub fn idle_ms(&self) -> u32 {
        if self.operating_flags.contains(OperatingFlags::QUICK_LIGHT_SLEEP) {
            self.quick_light_sleep_ms
        } else {
            self.light_sleep_ms
        }
    }
}
