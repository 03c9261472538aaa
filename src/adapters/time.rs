//! Monotonic clock adapter.
//!
//! Provides the millisecond tick the measurement loop runs on.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic,
//!   compensated across light sleep).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` plus a
//!   skipped-time offset, so the simulator can fast-forward through
//!   blocking waits and sleeps instead of sitting in them.

/// Monotonic clock for the node.
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    skipped_us: u64,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            skipped_us: 0,
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since start, including skipped time.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64 + self.skipped_us
    }

    /// Milliseconds since boot, wrapping at `u32::MAX`.
    pub fn now_millis(&self) -> u32 {
        (self.uptime_us() / 1_000) as u32
    }

    /// Move the simulated clock forward without waiting.
    #[cfg(not(target_os = "espidf"))]
    pub fn skip_us(&mut self, us: u64) {
        self.skipped_us = self.skipped_us.saturating_add(us);
    }
}
