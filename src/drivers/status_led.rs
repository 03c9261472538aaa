//! Status LED driver.
//!
//! One GPIO drives a single-colour LED.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: sets the GPIO level through the IDF driver.
//! On host/test: tracks state in-memory only.

use super::led_patterns::{LedPattern, LedPatternEngine};

pub struct StatusLed {
    gpio: i32,
    lit: bool,
    engine: LedPatternEngine,
}

impl StatusLed {
    pub fn new(gpio: i32) -> Self {
        #[cfg(target_os = "espidf")]
        // SAFETY: plain register configuration of a pin owned by this driver.
        unsafe {
            esp_idf_svc::sys::gpio_reset_pin(gpio);
            esp_idf_svc::sys::gpio_set_direction(gpio, esp_idf_svc::sys::gpio_mode_t_GPIO_MODE_OUTPUT);
        }
        Self {
            gpio,
            lit: false,
            engine: LedPatternEngine::new(),
        }
    }

    /// Switch pattern; returns the previous one.
    pub fn set_pattern(&mut self, pattern: LedPattern) -> LedPattern {
        let previous = self.engine.set(pattern);
        let level = self.engine.tick(0);
        self.write(level);
        previous
    }

    pub fn pattern(&self) -> LedPattern {
        self.engine.pattern()
    }

    /// Advance the pattern and update the pin.
    pub fn tick(&mut self, delta_ms: u32) {
        let level = self.engine.tick(delta_ms);
        self.write(level);
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    fn write(&mut self, level: bool) {
        if level == self.lit {
            return;
        }
        #[cfg(target_os = "espidf")]
        // SAFETY: the pin was configured as an output in `new`.
        unsafe {
            esp_idf_svc::sys::gpio_set_level(self.gpio, u32::from(level));
        }
        #[cfg(not(target_os = "espidf"))]
        let _ = self.gpio;
        self.lit = level;
    }
}
