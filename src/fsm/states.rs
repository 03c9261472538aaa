//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.  Side effects live in the entry actions;
//! updates only decide where to go next.
//!
//! ```text
//!  INITIAL ──▶ INACTIVE ──[activate]──▶ WARMUP ──[settled]──▶ MEASURE
//!                 ▲                                              │
//!                 │                                              ▼
//!            [deactivate]                                    TRANSMIT
//!                 │                                              │
//!                 └────────── SLEEPING ◀────────[send complete]──┘
//!                               │  ▲
//!                  [timer ready]│  │
//!                               ▼  │
//!                             MEASURE
//!
//!  Any state ──[exit request or unprovisioned network]──▶ FINAL
//! ```

use log::{debug, info, warn};

use super::context::FsmContext;
use super::{StateDescriptor, StateId};
use crate::app::events::AppEvent;
use crate::app::ports::Board;
use crate::config::{DebugFlags, OperatingFlags};
use crate::drivers::led_patterns::LedPattern;
use crate::power;
use crate::telemetry::{Reading, fill_tx_buffer};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table<B: Board>() -> [StateDescriptor<B>; StateId::COUNT] {
    [
        // Index 0: Initial
        StateDescriptor {
            id: StateId::Initial,
            name: "Initial",
            on_enter: Some(initial_enter),
            on_exit: None,
            on_update: initial_update,
        },
        // Index 1: Inactive
        StateDescriptor {
            id: StateId::Inactive,
            name: "Inactive",
            on_enter: Some(inactive_enter),
            on_exit: None,
            on_update: inactive_update,
        },
        // Index 2: Warmup
        StateDescriptor {
            id: StateId::Warmup,
            name: "Warmup",
            on_enter: Some(warmup_enter),
            on_exit: Some(warmup_exit),
            on_update: warmup_update,
        },
        // Index 3: Measure
        StateDescriptor {
            id: StateId::Measure,
            name: "Measure",
            on_enter: Some(measure_enter),
            on_exit: None,
            on_update: measure_update,
        },
        // Index 4: Transmit
        StateDescriptor {
            id: StateId::Transmit,
            name: "Transmit",
            on_enter: Some(transmit_enter),
            on_exit: None,
            on_update: transmit_update,
        },
        // Index 5: Sleeping
        StateDescriptor {
            id: StateId::Sleeping,
            name: "Sleeping",
            on_enter: Some(sleeping_enter),
            on_exit: None,
            on_update: sleeping_update,
        },
        // Index 6: Final
        StateDescriptor {
            id: StateId::Final,
            name: "Final",
            on_enter: Some(final_enter),
            on_exit: None,
            on_update: final_update,
        },
    ]
}

fn trace<B>(ctx: &FsmContext<B>, name: &str) {
    if ctx.debug_enabled(DebugFlags::TRACE) {
        debug!("{}: enter", name);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  INITIAL state
// ═══════════════════════════════════════════════════════════════════════════

fn initial_enter<B: Board>(ctx: &mut FsmContext<B>) {
    trace(ctx, "INITIAL");
    ctx.measurement.reset();
}

fn initial_update<B: Board>(ctx: &mut FsmContext<B>) -> Option<StateId> {
    if ctx.requests.exit {
        return Some(StateId::Final);
    }
    Some(StateId::Inactive)
}

// ═══════════════════════════════════════════════════════════════════════════
//  INACTIVE state: waiting for an activate request
// ═══════════════════════════════════════════════════════════════════════════

fn inactive_enter<B: Board>(ctx: &mut FsmContext<B>) {
    trace(ctx, "INACTIVE");
    ctx.board.set_pattern(LedPattern::Off);
}

fn inactive_update<B: Board>(ctx: &mut FsmContext<B>) -> Option<StateId> {
    if ctx.requests.exit {
        return Some(StateId::Final);
    }

    if ctx.requests.active {
        ctx.requests.clear();
        ctx.active = true;
        let now = ctx.now();
        ctx.uplink_timer.retrigger(now);
        info!("INACTIVE: activated, uplink every {}s", ctx.tx_cycle_secs);
        return Some(StateId::Warmup);
    }

    // Already inactive.
    ctx.requests.inactive = false;
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  WARMUP state: let the sensors settle after activation
// ═══════════════════════════════════════════════════════════════════════════

fn warmup_enter<B: Board>(ctx: &mut FsmContext<B>) {
    trace(ctx, "WARMUP");
    let now = ctx.now();
    ctx.settle.start(now, ctx.config.warmup_secs.saturating_mul(1_000));
    info!("WARMUP: settling for {}s", ctx.config.warmup_secs);
}

fn warmup_exit<B: Board>(ctx: &mut FsmContext<B>) {
    ctx.settle.clear();
}

fn warmup_update<B: Board>(ctx: &mut FsmContext<B>) -> Option<StateId> {
    if ctx.requests.exit {
        return Some(StateId::Final);
    }

    if ctx.settle.timed_out() {
        return Some(StateId::Measure);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  MEASURE state: one synchronous sweep into the snapshot
// ═══════════════════════════════════════════════════════════════════════════

fn measure_enter<B: Board>(ctx: &mut FsmContext<B>) {
    trace(ctx, "MEASURE");
    ctx.board.set_pattern(LedPattern::Measuring);

    // This cycle answers any pending uplink tick; the next deadline is one
    // period from the current one.
    let now = ctx.now();
    ctx.uplink_timer.is_ready(now);

    match ctx.board.read_vbat() {
        Ok(v) => ctx.measurement.record(Reading::Battery(v)),
        Err(e) => {
            if ctx.debug_enabled(DebugFlags::ERROR) {
                warn!("MEASURE: battery read failed: {}", e);
            }
        }
    }
    if let Some(count) = ctx.board.boot_count() {
        ctx.measurement.record(Reading::BootCount(count));
    }
    let vsystem = ctx.board.read_vsystem();
    let vbus = ctx.board.read_vbus();
    ctx.measurement.record(Reading::Supply { vsystem, vbus });
    debug!("MEASURE: vsys {:.2} V, vbus {:.2} V", vsystem, vbus);

    let failures = ctx.sensors.sweep(&mut ctx.measurement);
    info!(
        "MEASURE: flags 0x{:04x}, {} sensor error(s)",
        ctx.measurement.flags().bits(),
        failures
    );
}

fn measure_update<B: Board>(ctx: &mut FsmContext<B>) -> Option<StateId> {
    if ctx.requests.exit {
        return Some(StateId::Final);
    }
    Some(StateId::Transmit)
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRANSMIT state: encode, hand to the radio, wait for completion
// ═══════════════════════════════════════════════════════════════════════════

fn transmit_enter<B: Board>(ctx: &mut FsmContext<B>) {
    trace(ctx, "TRANSMIT");

    let flags = ctx.measurement.flags();
    fill_tx_buffer(&mut ctx.tx_buffer, &ctx.measurement);
    ctx.log_buffer.copy_from(&ctx.tx_buffer);
    ctx.measurement.reset();

    start_transmission(ctx, flags.bits());
}

fn start_transmission<B: Board>(ctx: &mut FsmContext<B>, flags: u16) {
    ctx.board.set_pattern(LedPattern::Sending);

    let confirmed = ctx
        .config
        .operating_flags
        .contains(OperatingFlags::CONFIRMED_UPLINK);
    if confirmed {
        info!("TRANSMIT: requesting confirmed tx");
    }

    ctx.tx.pending = true;
    ctx.tx.complete = false;
    ctx.tx.error = false;

    match ctx.board.send(ctx.tx_buffer.as_slice(), confirmed) {
        Ok(()) => {
            let len = ctx.tx_buffer.len();
            ctx.emit(AppEvent::UplinkQueued {
                len,
                flags,
                confirmed,
            });
        }
        Err(e) => {
            warn!("TRANSMIT: send failed: {}", e);
            ctx.tx.pending = false;
            ctx.tx.complete = true;
            ctx.tx.error = true;
            ctx.emit(AppEvent::UplinkDone(Err(e)));
        }
    }
}

fn transmit_update<B: Board>(ctx: &mut FsmContext<B>) -> Option<StateId> {
    if ctx.requests.exit {
        return Some(StateId::Final);
    }

    // No network identity: nothing will ever go out.
    if !ctx.board.is_provisioned() {
        warn!("TRANSMIT: network not provisioned, stopping");
        return Some(StateId::Final);
    }

    if ctx.tx.complete {
        ctx.uplinks = ctx.uplinks.wrapping_add(1);
        ctx.update_tx_cycle_time();
        return Some(StateId::Sleeping);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEPING state: wait for the next uplink tick
// ═══════════════════════════════════════════════════════════════════════════

fn sleeping_enter<B: Board>(ctx: &mut FsmContext<B>) {
    trace(ctx, "SLEEPING");
    ctx.board.set_pattern(LedPattern::Sleeping);
    ctx.printed_sleeping = false;
}

fn sleeping_update<B: Board>(ctx: &mut FsmContext<B>) -> Option<StateId> {
    if ctx.requests.exit {
        return Some(StateId::Final);
    }

    if ctx.requests.inactive {
        ctx.requests.clear();
        ctx.active = false;
        info!("SLEEPING: deactivated");
        return Some(StateId::Inactive);
    }

    let now = ctx.now();
    if ctx.uplink_timer.is_ready(now) {
        return Some(StateId::Measure);
    }

    if ctx.uplink_timer.remaining_ms(now) > ctx.config.sleep_threshold_ms {
        power::sleep(ctx);

        // A deep sleep normally runs to the deadline.
        let now = ctx.now();
        if ctx.uplink_timer.is_ready(now) {
            return Some(StateId::Measure);
        }
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FINAL state: terminal
// ═══════════════════════════════════════════════════════════════════════════

fn final_enter<B: Board>(ctx: &mut FsmContext<B>) {
    trace(ctx, "FINAL");
    ctx.board.set_pattern(LedPattern::Off);
    ctx.active = false;
    info!("FINAL: measurement loop stopped");
}

fn final_update<B: Board>(_ctx: &mut FsmContext<B>) -> Option<StateId> {
    None
}
