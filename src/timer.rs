//! Millisecond deadline timers.
//!
//! Both timers take the current tick from the caller (the power port's
//! `now_millis()`) rather than reading a clock.  Elapsed time is the
//! wrapping `u32` difference from the period start, so they survive the
//! ~49-day tick rollover and accept any period the clock can hold.

fn elapsed(start_ms: u32, now_ms: u32) -> u32 {
    now_ms.wrapping_sub(start_ms)
}

// ---------------------------------------------------------------------------
// UplinkTimer
// ---------------------------------------------------------------------------

/// Repeating timer that paces uplinks.
///
/// A tick is pending once `interval` has elapsed since the current period
/// started.  Consuming ticks advances the period start by whole intervals,
/// so a late poll does not shift later deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UplinkTimer {
    start_ms: u32,
    interval_ms: u32,
}

impl UplinkTimer {
    /// Start a period at `now_ms`.
    pub fn new(now_ms: u32, interval_ms: u32) -> Self {
        Self {
            start_ms: now_ms,
            interval_ms: interval_ms.max(1),
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Change the period length.  The current period keeps its start, so a
    /// shorter interval may make a tick pending right away.
    pub fn set_interval(&mut self, interval_ms: u32) {
        self.interval_ms = interval_ms.max(1);
    }

    /// Make a tick pending now.
    pub fn retrigger(&mut self, now_ms: u32) {
        self.start_ms = now_ms.wrapping_sub(self.interval_ms);
    }

    /// Number of ticks pending, without consuming them.
    pub fn peek_ticks(&self, now_ms: u32) -> u32 {
        elapsed(self.start_ms, now_ms) / self.interval_ms
    }

    /// Consume pending ticks.  Returns `true` if there was at least one.
    pub fn is_ready(&mut self, now_ms: u32) -> bool {
        let ticks = self.peek_ticks(now_ms);
        if ticks == 0 {
            return false;
        }
        self.start_ms = self
            .start_ms
            .wrapping_add(ticks.wrapping_mul(self.interval_ms));
        true
    }

    /// Milliseconds until the next tick; zero if one is pending.
    pub fn remaining_ms(&self, now_ms: u32) -> u32 {
        self.interval_ms.saturating_sub(elapsed(self.start_ms, now_ms))
    }
}

// ---------------------------------------------------------------------------
// SettleTimer
// ---------------------------------------------------------------------------

/// One-shot timer.  `poll` latches an event when the delay elapses and
/// `timed_out` consumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleTimer {
    start_ms: u32,
    delay_ms: u32,
    active: bool,
    fired: bool,
}

impl SettleTimer {
    pub fn start(&mut self, now_ms: u32, delay_ms: u32) {
        self.start_ms = now_ms;
        self.delay_ms = delay_ms;
        self.active = true;
        self.fired = false;
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.fired = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Latch the expiry event.  Returns `true` on the poll where it fires.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if self.active && elapsed(self.start_ms, now_ms) >= self.delay_ms {
            self.active = false;
            self.fired = true;
            return true;
        }
        false
    }

    /// Consume a latched expiry.
    pub fn timed_out(&mut self) -> bool {
        core::mem::take(&mut self.fired)
    }
}
