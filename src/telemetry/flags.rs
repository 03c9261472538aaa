//! Presence bitmask for measurement groups.
//!
//! Bit positions are part of the uplink format: the low byte travels as
//! byte 1 of every message, and the collector uses it to know which fields
//! follow.  Do not renumber.

crate::bits::bit_set! {
    /// Which optional groups of a [`Measurement`](super::Measurement) hold
    /// a value read this cycle.
    pub struct MeasurementFlags(u16) {
        /// Battery voltage.
        const VBAT = 1 << 0;
        /// Boot counter.
        const BOOT = 1 << 1;
        /// Temperature and relative humidity.
        const TH = 1 << 2;
        /// Latitude, longitude, and GNSS time.
        const GPS = 1 << 3;
        /// Particulate mass and count bins.
        const PM = 1 << 4;
        /// Carbon dioxide.
        const CO2 = 1 << 5;
        /// Carbon monoxide.
        const CO = 1 << 6;
        /// Nitrogen dioxide.
        const NO2 = 1 << 7;
        /// Ozone.
        const O3 = 1 << 8;
        /// Sulfur dioxide.
        const SO2 = 1 << 9;
        /// Total volatile organic compounds (reserved in this format).
        const TVOC = 1 << 10;
        /// Indoor air-quality index (reserved in this format).
        const IAQ = 1 << 11;
    }
}

impl MeasurementFlags {
    /// The four electrochemical gas channels.
    pub const GASES: Self = Self::from_bits(
        Self::CO.bits() | Self::NO2.bits() | Self::O3.bits() | Self::SO2.bits(),
    );

    /// Low byte, as written into the uplink header.
    pub const fn low_byte(self) -> u8 {
        (self.bits() & 0xFF) as u8
    }
}
