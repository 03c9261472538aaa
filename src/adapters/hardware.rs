//! Hardware adapter: bridges the board to the domain port traits.
//!
//! Owns the clock, the status LED and the uplink transport, and exposes
//! them with the supply rails through [`PowerPort`], [`PlatformPort`],
//! [`IndicatorPort`] and [`UplinkPort`].  This is the only module in the
//! system that touches the power controller.  On non-espidf targets the
//! sleeps and delays fast-forward the simulated clock.

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::{IndicatorPort, PlatformPort, PowerPort, UplinkPort};
use crate::drivers::hw_init::{self, Rail};
use crate::drivers::led_patterns::LedPattern;
use crate::drivers::status_led::StatusLed;
use crate::error::{SensorError, TransmitError};
use crate::pins;

use super::time::MonotonicClock;

/// Concrete adapter that combines the board behind port traits.
pub struct BoardAdapter<U> {
    clock: MonotonicClock,
    led: StatusLed,
    uplink: U,
    boot_count: Option<u32>,
    last_led_ms: u32,
}

impl<U: UplinkPort> BoardAdapter<U> {
    pub fn new(clock: MonotonicClock, led: StatusLed, uplink: U, boot_count: Option<u32>) -> Self {
        let last_led_ms = clock.now_millis();
        Self {
            clock,
            led,
            uplink,
            boot_count,
            last_led_ms,
        }
    }

    /// Advance the LED pattern to the current time.  Call between polls.
    pub fn service_led(&mut self) {
        let now = self.clock.now_millis();
        self.led.tick(now.wrapping_sub(self.last_led_ms));
        self.last_led_ms = now;
    }

    pub fn uplink(&self) -> &U {
        &self.uplink
    }
}

// ── DelayNs implementation ────────────────────────────────────

impl<U> DelayNs for BoardAdapter<U> {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_svc::hal::delay::Ets::delay_us(ns.div_ceil(1_000));
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        self.clock.skip_us(u64::from(ns.div_ceil(1_000)));
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }
}

// ── PowerPort implementation ──────────────────────────────────

impl<U> PowerPort for BoardAdapter<U> {
    fn now_millis(&self) -> u32 {
        self.clock.now_millis()
    }

    #[cfg(target_os = "espidf")]
    fn sleep_for(&mut self, secs: u32) {
        // SAFETY: plain power-management calls from the main task.  Light
        // sleep keeps RAM and resumes here; esp_timer is compensated.
        unsafe {
            esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(u64::from(secs) * 1_000_000);
            esp_idf_svc::sys::esp_light_sleep_start();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep_for(&mut self, secs: u32) {
        info!("Board(sim): sleeping {}s", secs);
        self.clock.skip_us(u64::from(secs) * 1_000_000);
    }

    fn debug_link_active(&self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: read-only query of the USB-Serial-JTAG state.
            unsafe { esp_idf_svc::sys::usb_serial_jtag_is_connected() }
        }
        #[cfg(not(target_os = "espidf"))]
        {
            false
        }
    }

    fn suspend_peripherals(&mut self) {
        hw_init::set_sensor_power(false);
        info!("Board: sensor power off");
    }

    fn resume_peripherals(&mut self) {
        hw_init::set_sensor_power(true);
        info!("Board: sensor power on");
    }
}

// ── PlatformPort implementation ───────────────────────────────

impl<U> PlatformPort for BoardAdapter<U> {
    fn read_vbat(&mut self) -> Result<f32, SensorError> {
        let v = hw_init::rail_volts(Rail::Battery).ok_or(SensorError::BusError)?;
        if v < pins::VBAT_MIN_PLAUSIBLE {
            return Err(SensorError::Absent);
        }
        Ok(v)
    }

    fn read_vbus(&mut self) -> f32 {
        hw_init::rail_volts(Rail::Bus).unwrap_or(0.0)
    }

    fn read_vsystem(&mut self) -> f32 {
        hw_init::rail_volts(Rail::System).unwrap_or(0.0)
    }

    fn boot_count(&self) -> Option<u32> {
        self.boot_count
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl<U> IndicatorPort for BoardAdapter<U> {
    fn set_pattern(&mut self, pattern: LedPattern) -> LedPattern {
        self.led.set_pattern(pattern)
    }
}

// ── UplinkPort implementation ─────────────────────────────────

impl<U: UplinkPort> UplinkPort for BoardAdapter<U> {
    fn is_provisioned(&self) -> bool {
        self.uplink.is_provisioned()
    }

    fn send(&mut self, payload: &[u8], confirmed: bool) -> Result<(), TransmitError> {
        self.uplink.send(payload, confirmed)
    }

    fn take_completion(&mut self) -> Option<bool> {
        self.uplink.take_completion()
    }
}
