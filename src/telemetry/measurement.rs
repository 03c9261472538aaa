//! Per-cycle measurement snapshot.
//!
//! A [`Measurement`] is zeroed at the start of a cycle, filled by the sensor
//! sweep, handed to the encoder, and zeroed again.  Every field group is
//! written through [`Measurement::record`], which stores the values and sets
//! the group's flag bit in one step, so a flag is never set without its data.

use super::flags::MeasurementFlags;

/// Number of particulate size bins.
pub const PM_BINS: usize = 7;

/// Upper edge of each particulate bin in µm, in wire order.
pub const PM_BIN_DIAMETERS_UM: [f32; PM_BINS] = [0.1, 0.3, 0.5, 1.0, 2.5, 5.0, 10.0];

// ---------------------------------------------------------------------------
// Field groups
// ---------------------------------------------------------------------------

/// Temperature (°C) and relative humidity (%).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Environment {
    pub temperature_c: f32,
    pub humidity: f32,
}

/// Particulate mass (µg/m³) and count per bin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Particulate {
    pub mass: [f32; PM_BINS],
    pub count: [u32; PM_BINS],
}

/// Electrochemical gas concentrations in ppm.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GasConcentrations {
    pub co: f32,
    pub no2: f32,
    pub o3: f32,
    pub so2: f32,
}

/// GNSS fix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    /// Degrees, positive north.
    pub latitude: f64,
    /// Degrees, positive east.
    pub longitude: f64,
    /// Seconds since the Unix epoch.
    pub unix_time: u32,
}

/// One of the four gas channels behind the analog front end.
///
/// The discriminant is the front-end input the channel is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GasChannel {
    Co = 0,
    No2 = 1,
    O3 = 2,
    So2 = 3,
}

impl GasChannel {
    /// All channels, in front-end input order.
    pub const ALL: [Self; 4] = [Self::Co, Self::No2, Self::O3, Self::So2];

    pub const fn flag(self) -> MeasurementFlags {
        match self {
            Self::Co => MeasurementFlags::CO,
            Self::No2 => MeasurementFlags::NO2,
            Self::O3 => MeasurementFlags::O3,
            Self::So2 => MeasurementFlags::SO2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Co => "CO",
            Self::No2 => "NO2",
            Self::O3 => "O3",
            Self::So2 => "SO2",
        }
    }
}

/// A successful read of one field group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Battery voltage (V).
    Battery(f32),
    /// Boot counter.
    BootCount(u32),
    /// System rail and USB bus voltage (V).  Logged, never encoded, no flag.
    Supply { vsystem: f32, vbus: f32 },
    Environment(Environment),
    /// CO2 concentration (ppm).
    Co2(f32),
    Particulate(Particulate),
    /// One gas channel (ppm).
    Gas(GasChannel, f32),
    Position(Position),
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// The snapshot of one measurement cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    flags: MeasurementFlags,
    vbat: f32,
    vsystem: f32,
    vbus: f32,
    boot_count: u32,
    env: Environment,
    co2_ppm: f32,
    particulate: Particulate,
    gases: GasConcentrations,
    position: Position,
}

impl Measurement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every field and clear all flags.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Store a reading and mark its group present.
    pub fn record(&mut self, reading: Reading) {
        match reading {
            Reading::Battery(v) => {
                self.vbat = v;
                self.flags |= MeasurementFlags::VBAT;
            }
            Reading::BootCount(n) => {
                self.boot_count = n;
                self.flags |= MeasurementFlags::BOOT;
            }
            Reading::Supply { vsystem, vbus } => {
                self.vsystem = vsystem;
                self.vbus = vbus;
            }
            Reading::Environment(env) => {
                self.env = env;
                self.flags |= MeasurementFlags::TH;
            }
            Reading::Co2(ppm) => {
                self.co2_ppm = ppm;
                self.flags |= MeasurementFlags::CO2;
            }
            Reading::Particulate(pm) => {
                self.particulate = pm;
                self.flags |= MeasurementFlags::PM;
            }
            Reading::Gas(channel, ppm) => {
                match channel {
                    GasChannel::Co => self.gases.co = ppm,
                    GasChannel::No2 => self.gases.no2 = ppm,
                    GasChannel::O3 => self.gases.o3 = ppm,
                    GasChannel::So2 => self.gases.so2 = ppm,
                }
                self.flags |= channel.flag();
            }
            Reading::Position(pos) => {
                self.position = pos;
                self.flags |= MeasurementFlags::GPS;
            }
        }
    }

    pub fn flags(&self) -> MeasurementFlags {
        self.flags
    }

    pub fn vbat(&self) -> f32 {
        self.vbat
    }

    pub fn vsystem(&self) -> f32 {
        self.vsystem
    }

    pub fn vbus(&self) -> f32 {
        self.vbus
    }

    pub fn boot_count(&self) -> u32 {
        self.boot_count
    }

    pub fn env(&self) -> Environment {
        self.env
    }

    pub fn co2_ppm(&self) -> f32 {
        self.co2_ppm
    }

    pub fn particulate(&self) -> &Particulate {
        &self.particulate
    }

    pub fn gases(&self) -> GasConcentrations {
        self.gases
    }

    pub fn position(&self) -> Position {
        self.position
    }
}
