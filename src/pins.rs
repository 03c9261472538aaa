//! GPIO / peripheral pin assignments for the multigas node main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Supply rails: Analog (ADC1)
// ---------------------------------------------------------------------------

/// Battery voltage through a 1:2 divider.  ADC1 channel 3 (GPIO 4).
pub const VBAT_ADC_CHANNEL: u32 = 3;
/// USB bus voltage through a 1:2 divider.  ADC1 channel 4 (GPIO 5).
pub const VBUS_ADC_CHANNEL: u32 = 4;
/// Regulated system rail through a 1:2 divider.  ADC1 channel 5 (GPIO 6).
pub const VSYS_ADC_CHANNEL: u32 = 5;

/// Divider ratio shared by the three rail inputs.
pub const RAIL_DIVIDER: f32 = 2.0;
/// Battery below this reads as "no battery fitted" (V).
pub const VBAT_MIN_PLAUSIBLE: f32 = 1.0;

// ---------------------------------------------------------------------------
// Sensor buses
// ---------------------------------------------------------------------------

/// I2C bus shared by SHT3x, SCD30, IPS-7100 and the GPS module.
pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;

/// Load switch for the sensor power domain.  HIGH = powered.
pub const SENSOR_POWER_GPIO: i32 = 10;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// Single-colour status LED, active HIGH.
pub const STATUS_LED_GPIO: i32 = 21;
