//! Board drivers: peripheral initialisation and the status LED.

pub mod hw_init;
pub mod led_patterns;
pub mod status_led;
