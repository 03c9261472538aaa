//! One-shot hardware peripheral initialization and the raw rail/bus helpers.
//!
//! Configures the ADC channels for the supply rails and the sensor power
//! switch using raw ESP-IDF sys calls.  Called once from `main()` before
//! the measurement loop starts.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: ADC1 oneshot reads and GPIO writes.
//! On host/test: rail voltages come from static atomics for injection.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::AtomicU32;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

/// Supply rail monitored through ADC1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rail {
    Battery,
    Bus,
    System,
}

impl Rail {
    const fn channel(self) -> u32 {
        match self {
            Self::Battery => pins::VBAT_ADC_CHANNEL,
            Self::Bus => pins::VBUS_ADC_CHANNEL,
            Self::System => pins::VSYS_ADC_CHANNEL,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    const fn index(self) -> usize {
        match self {
            Self::Battery => 0,
            Self::Bus => 1,
            Self::System => 2,
        }
    }
}

static SENSOR_POWER: AtomicBool = AtomicBool::new(false);

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio_outputs()?;
    }
    set_sensor_power(true);
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    set_sensor_power(true);
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.  No concurrent access is possible because
/// `init_adc()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for rail in [Rail::Battery, Rail::Bus, Rail::System] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), rail.channel(), &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!("hw_init: ADC1 configured (vbat, vbus, vsys)");
    Ok(())
}

#[cfg(target_os = "espidf")]
fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.max(0) as u16)
}

/// Full-scale input at 12 dB attenuation (V).
#[cfg(target_os = "espidf")]
const ADC_FULL_SCALE_V: f32 = 3.1;

/// Rail voltage after the divider, or `None` if the ADC read failed.
#[cfg(target_os = "espidf")]
pub fn rail_volts(rail: Rail) -> Option<f32> {
    let raw = adc1_read(rail.channel())?;
    Some(f32::from(raw) / 4095.0 * ADC_FULL_SCALE_V * pins::RAIL_DIVIDER)
}

#[cfg(not(target_os = "espidf"))]
static SIM_RAIL_MV: [AtomicU32; 3] = [
    AtomicU32::new(3_900),
    AtomicU32::new(0),
    AtomicU32::new(3_300),
];

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_rail_mv(rail: Rail, mv: u32) {
    SIM_RAIL_MV[rail.index()].store(mv, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn rail_volts(rail: Rail) -> Option<f32> {
    let _ = rail.channel();
    Some(SIM_RAIL_MV[rail.index()].load(Ordering::Relaxed) as f32 / 1_000.0)
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::SENSOR_POWER_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

/// Switch the sensor power domain.
pub fn set_sensor_power(on: bool) {
    #[cfg(target_os = "espidf")]
    // SAFETY: the pin was configured as an output in init_gpio_outputs();
    // main-loop only.
    unsafe {
        gpio_set_level(pins::SENSOR_POWER_GPIO, u32::from(on));
    }
    SENSOR_POWER.store(on, Ordering::Relaxed);
}

pub fn sensor_power() -> bool {
    SENSOR_POWER.load(Ordering::Relaxed)
}
