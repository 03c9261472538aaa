//! Port traits: the hexagonal boundary between the measurement loop and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MeasurementLoop (domain)
//! ```
//!
//! Sensor drivers, the radio stack, the power controller, the status LED and
//! persistent storage all implement these traits.  The
//! [`MeasurementLoop`](super::service::MeasurementLoop) consumes them via
//! generics or trait objects, so the domain core never touches hardware
//! directly.

use embedded_hal::delay::DelayNs;

use crate::config::{GasCalibration, SystemConfig};
use crate::drivers::led_patterns::LedPattern;
use crate::error::{SensorError, TransmitError};
use crate::telemetry::{GasChannel, Measurement};

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapters: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// What happens to a sensor across a deep sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepBehavior {
    /// Keeps its state; nothing to do.
    Retains,
    /// Loses power with the buses; must be shut down before sleep and
    /// re-initialised on wake.
    Reinitialize,
}

/// A sensor that is read once per measurement sweep.
pub trait SensorAdapter {
    /// Short name for diagnostics ("SHT3x", "IPS-7100", ...).
    fn name(&self) -> &'static str;

    /// Bring the sensor up.  Returns `false` if it is not fitted or does
    /// not answer; the hub then skips it for the rest of the run.
    fn init(&mut self) -> bool;

    /// Read the sensor and record its groups into `m`.  On error nothing
    /// may be recorded for the failing group.
    fn read(&mut self, m: &mut Measurement) -> Result<(), SensorError>;

    fn sleep_behavior(&self) -> SleepBehavior {
        SleepBehavior::Retains
    }

    /// Quiesce before deep sleep.  Only called for
    /// [`SleepBehavior::Reinitialize`] sensors.
    fn shutdown(&mut self) {}

    /// Take a new gas calibration.  Sensors without gas channels ignore it.
    fn apply_calibration(&mut self, _cal: &GasCalibration) {}
}

/// One CO2 sample, with the sensor's own temperature and humidity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Co2Sample {
    pub co2_ppm: f32,
    pub temperature_c: f32,
    pub humidity: f32,
}

/// Free-running CO2 sensor sampled opportunistically between sweeps.
pub trait Co2Sensor {
    fn begin(&mut self) -> bool;

    /// Milliseconds until the sensor's next internal sample.
    fn ms_to_next_measurement(&self) -> u32;

    /// Non-blocking "new data available" query.
    fn query_ready(&mut self) -> Result<bool, SensorError>;

    fn read_measurement(&mut self) -> Result<Co2Sample, SensorError>;

    /// Stop measuring before deep sleep.
    fn end(&mut self);
}

/// Multi-channel ADC in front of the electrochemical gas cells.
pub trait AnalogFrontEnd {
    fn begin(&mut self) -> bool;

    /// Voltage at the channel's input (V).
    fn read_voltage(&mut self, channel: GasChannel) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Board ports (driven adapters: domain ↔ platform)
// ───────────────────────────────────────────────────────────────

/// Radio / network session.
pub trait UplinkPort {
    /// `false` when the node has no network identity; uplinks can never
    /// succeed.
    fn is_provisioned(&self) -> bool;

    /// Queue `payload`.  `Ok` means the send was launched and a completion
    /// will follow through [`take_completion`](Self::take_completion).
    fn send(&mut self, payload: &[u8], confirmed: bool) -> Result<(), TransmitError>;

    /// Outcome of the launched send, once known (`true` = delivered).
    fn take_completion(&mut self) -> Option<bool>;
}

/// Clock and power controller.  The delay half (`DelayNs`) is used for the
/// blocking countdown before deep sleep.
pub trait PowerPort: DelayNs {
    /// Milliseconds since boot, wrapping.
    fn now_millis(&self) -> u32;

    /// Deep sleep for `secs`.  The clock keeps counting while asleep.
    fn sleep_for(&mut self, secs: u32);

    /// A host is attached to the debug/USB port.
    fn debug_link_active(&self) -> bool;

    /// Shut down buses and the debug port before deep sleep.
    fn suspend_peripherals(&mut self);

    /// Bring buses and the debug port back after deep sleep.
    fn resume_peripherals(&mut self);
}

/// Supply rails and persistent counters.
pub trait PlatformPort {
    fn read_vbat(&mut self) -> Result<f32, SensorError>;

    fn read_vbus(&mut self) -> f32;

    fn read_vsystem(&mut self) -> f32;

    /// `None` when the counter is not available.
    fn boot_count(&self) -> Option<u32>;
}

/// Status LED.
pub trait IndicatorPort {
    /// Switch pattern; returns the pattern that was showing.
    fn set_pattern(&mut self, pattern: LedPattern) -> LedPattern;
}

/// Everything the measurement loop needs from the platform, as one value.
pub trait Board: PowerPort + PlatformPort + IndicatorPort + UplinkPort {}

impl<T: PowerPort + PlatformPort + IndicatorPort + UplinkPort> Board for T {}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage (boot counter, last uplink record).
///
/// Keys are namespaced per subsystem.  Writes MUST be atomic.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}

impl From<crate::error::Error> for ConfigError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::Config(msg) => Self::ValidationFailed(msg),
            _ => Self::IoError,
        }
    }
}
