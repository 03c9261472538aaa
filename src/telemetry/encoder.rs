//! Snapshot → uplink message, format 0x27.
//!
//! ```text
//!  ┌─────┬───────┬──────┬──────┬───────┬─────┬────────┬───────┬─────────┐
//!  │ tag │ flags │ Vbat │ boot │ T, RH │ CO2 │ PM ×14 │ gas×4 │ lat,lon │
//!  │ 27  │  lo8  │  2   │  1   │ 2 + 2 │  2  │   28   │   8   │ 4+4+4   │
//!  └─────┴───────┴──────┴──────┴───────┴─────┴────────┴───────┴─────────┘
//! ```
//!
//! Every group after the flags byte is present only when its flag is set,
//! except the gas block: one successful channel emits all four slots, and
//! channels that failed carry the zeroed snapshot value.  The collector
//! decodes in this exact order.

use core::fmt;

use log::debug;

use super::buffer::UplinkBuffer;
use super::flags::MeasurementFlags;
use super::measurement::{Measurement, PM_BIN_DIAMETERS_UM};

/// Message format tag, byte 0 of every uplink.
pub const FORMAT_TAG: u8 = 0x27;

/// CO2 full scale (ppm) for the uflt16 encoding.
pub const CO2_FULL_SCALE_PPM: f32 = 40_000.0;
/// Particulate mass full scale (µg/m³).
pub const PM_MASS_FULL_SCALE: f32 = 65_536.0;
/// Particulate count full scale.
pub const PM_COUNT_FULL_SCALE: f32 = 16_777_216.0;
/// Gas full scale (ppm) for the sflt16 encoding.
pub const GAS_FULL_SCALE_PPM: f32 = 1_000.0;
/// Latitude/longitude fixed-point factor.
pub const GPS_DEGREE_SCALE: f64 = 1e7;

/// Encode `m` into `buf`, replacing its contents.
///
/// Reads the snapshot only.  Bus voltage is logged here but never encoded.
pub fn fill_tx_buffer(buf: &mut UplinkBuffer, m: &Measurement) {
    let flags = m.flags();

    buf.begin();
    buf.put(FORMAT_TAG);
    buf.put(flags.low_byte());

    debug!("Encoder: Vbus {} V", Decimal::new(m.vbus()));

    if flags.contains(MeasurementFlags::VBAT) {
        debug!("Encoder: Vbat {} V", Decimal::new(m.vbat()));
        buf.put_v(m.vbat());
    }

    if flags.contains(MeasurementFlags::BOOT) {
        debug!("Encoder: boot count {}", m.boot_count());
        buf.put_boot_count_lsb(m.boot_count());
    }

    if flags.contains(MeasurementFlags::TH) {
        let env = m.env();
        debug!(
            "Encoder: T {} C, RH {} %",
            Decimal::new(env.temperature_c),
            Decimal::new(env.humidity)
        );
        buf.put_t(env.temperature_c);
        buf.put2uf(env.humidity / 100.0);
    }

    if flags.contains(MeasurementFlags::CO2) {
        debug!("Encoder: CO2 {} ppm", Decimal::new(m.co2_ppm()));
        buf.put_uflt16(m.co2_ppm() / CO2_FULL_SCALE_PPM);
    }

    if flags.contains(MeasurementFlags::PM) {
        let pm = m.particulate();
        for (mass, size) in pm.mass.iter().zip(PM_BIN_DIAMETERS_UM) {
            debug!("Encoder: PM{} mass {} ug/m3", size, Decimal::new(*mass));
            buf.put_uflt16(*mass / PM_MASS_FULL_SCALE);
        }
        for (count, size) in pm.count.iter().zip(PM_BIN_DIAMETERS_UM) {
            debug!("Encoder: PM{} count {}", size, count);
            buf.put_uflt16(*count as f32 / PM_COUNT_FULL_SCALE);
        }
    }

    if flags.intersects(MeasurementFlags::GASES) {
        let g = m.gases();
        debug!(
            "Encoder: CO {} NO2 {} O3 {} SO2 {} ppm",
            Decimal::new(g.co),
            Decimal::new(g.no2),
            Decimal::new(g.o3),
            Decimal::new(g.so2)
        );
        for ppm in [g.co, g.no2, g.o3, g.so2] {
            buf.put_sflt16(ppm / GAS_FULL_SCALE_PPM);
        }
    }

    if flags.contains(MeasurementFlags::GPS) {
        let pos = m.position();
        debug!(
            "Encoder: lat {:.7} lon {:.7} t {}",
            pos.latitude, pos.longitude, pos.unix_time
        );
        buf.put4i(degrees_to_fixed(pos.latitude));
        buf.put4i(degrees_to_fixed(pos.longitude));
        buf.put4u(pos.unix_time);
    }

    if buf.overflowed() {
        log::warn!("Encoder: uplink buffer overflow, message truncated");
    }
}

fn degrees_to_fixed(deg: f64) -> i32 {
    if deg.is_nan() {
        return 0;
    }
    (deg * GPS_DEGREE_SCALE)
        .round()
        .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

// ---------------------------------------------------------------------------
// Diagnostic rendering
// ---------------------------------------------------------------------------

/// Renders a reading as `whole.ff` (two fractional digits, half-up), for
/// diagnostic lines on targets whose formatter lacks float support.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    negative: bool,
    hundredths: u32,
}

impl Decimal {
    pub fn new(v: f32) -> Self {
        let hundredths = if v.is_finite() {
            (v.abs() * 100.0 + 0.5) as u32
        } else {
            0
        };
        Self {
            negative: v < 0.0 && hundredths != 0,
            hundredths,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.hundredths / 100, self.hundredths % 100)
    }
}
