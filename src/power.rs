//! Sleep and power policy.
//!
//! While `Sleeping` with time to spare, the loop runs a sleep episode:
//! either a light sleep, where nothing happens here and the outer loop just
//! idles between polls, or a deep sleep through [`PowerPort::sleep_for`].
//! The choice is made by [`check_deep_sleep`].
//!
//! ```text
//!   Sleeping ──▶ alert (once per interval) ──▶ deep?
//!                                               ├─ no:  return, poll again later
//!                                               └─ yes: LED off
//!                                                       sensors down, buses down
//!                                                       sleep_for(secs)
//!                                                       buses up, sensors up
//! ```

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::Board;
use crate::config::{OperatingFlags, SystemConfig};
use crate::drivers::led_patterns::LedPattern;
use crate::fsm::context::FsmContext;

/// Kind of sleep episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// Cooperative idle; the loop keeps polling.
    Light,
    /// Peripherals off, `PowerPort::sleep_for`.
    Deep,
}

/// Decide whether the remaining interval should be spent in deep sleep.
///
/// Rules are applied in order; the first that matches decides.
pub fn check_deep_sleep(
    remaining_ms: u32,
    flags: OperatingFlags,
    debug_link_active: bool,
    min_secs: u32,
) -> bool {
    if remaining_ms < min_secs.saturating_mul(1_000) {
        false
    } else if flags.contains(OperatingFlags::DEEP_SLEEP_TEST) {
        true
    } else if debug_link_active {
        false
    } else if flags.contains(OperatingFlags::DISABLE_DEEP_SLEEP) {
        false
    } else {
        flags.contains(OperatingFlags::UNATTENDED)
    }
}

/// Length of the countdown shown before a deep sleep.
pub fn alert_secs(config: &SystemConfig) -> u32 {
    if config.operating_flags.contains(OperatingFlags::DEEP_SLEEP_TEST) {
        config.deep_sleep_test_alert_secs
    } else {
        config.deep_sleep_alert_secs
    }
}

/// Choose the mode for the interval remaining now.
pub fn plan<B: Board>(ctx: &FsmContext<B>) -> SleepMode {
    let remaining = ctx.uplink_timer.remaining_ms(ctx.now());
    let deep = check_deep_sleep(
        remaining,
        ctx.config.operating_flags,
        ctx.board.debug_link_active(),
        ctx.config.deep_sleep_min_secs,
    );
    if deep { SleepMode::Deep } else { SleepMode::Light }
}

/// Run one sleep episode from the `Sleeping` state.
pub fn sleep<B: Board>(ctx: &mut FsmContext<B>) {
    let mode = plan(ctx);

    if !ctx.printed_sleeping {
        sleep_alert(ctx, mode);
        ctx.printed_sleeping = true;
    }

    if mode == SleepMode::Deep {
        deep_sleep(ctx);
    }
}

fn sleep_alert<B: Board>(ctx: &mut FsmContext<B>, mode: SleepMode) {
    let secs = ctx.uplink_timer.remaining_ms(ctx.now()) / 1_000;
    ctx.emit(AppEvent::SleepPlanned { mode, secs });

    match mode {
        SleepMode::Light => info!("Power: using light sleep"),
        SleepMode::Deep => {
            ctx.board.set_pattern(LedPattern::TwoShort);
            let countdown = alert_secs(&ctx.config);
            info!("Power: deep sleep in {} seconds", countdown);
            for left in (1..=countdown).rev() {
                if left % 5 == 0 || left <= 3 {
                    info!("Power: {}...", left);
                }
                ctx.board.delay_ms(1_000);
            }
            ctx.board.delay_ms(ctx.config.deep_sleep_settle_ms);
        }
    }
}

fn deep_sleep<B: Board>(ctx: &mut FsmContext<B>) {
    // The alert countdown may have eaten the interval.
    let secs = ctx.uplink_timer.remaining_ms(ctx.now()) / 1_000;
    if secs == 0 {
        return;
    }

    ctx.board.set_pattern(LedPattern::Off);

    ctx.sensors.prepare_deep_sleep();
    ctx.board.suspend_peripherals();

    info!("Power: deep sleep for {}s", secs);
    ctx.board.sleep_for(secs);

    ctx.board.resume_peripherals();
    for name in ctx.sensors.recover_from_deep_sleep() {
        warn!("Power: {} did not come back after sleep", name);
        ctx.emit(AppEvent::SensorAbsent(name));
    }

    ctx.board.set_pattern(LedPattern::Sleeping);
    ctx.emit(AppEvent::Woke { slept_secs: secs });
}
