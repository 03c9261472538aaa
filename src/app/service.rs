//! Application service: the hexagonal core.
//!
//! [`MeasurementLoop`] owns the FSM and its shared context.  It exposes a
//! clean, hardware-agnostic API.  All I/O flows through the [`Board`] and
//! sensor ports injected at construction, and through the [`EventSink`]
//! and [`ConfigPort`] passed at call sites, making the entire loop testable
//! with mock adapters.
//!
//! ```text
//!  SensorHub ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                │    MeasurementLoop     │
//!      Board ◀──▶│  FSM · sleep · encoder │ ──▶ ConfigPort
//!                └────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::{MAX_TX_CYCLE_SECS, OperatingFlags, SystemConfig};
use crate::error::TransmitError;
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::sensors::SensorHub;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{Board, ConfigPort, EventSink};

/// Quiet period after the last change before the config is auto-saved.
const CONFIG_SAVE_DELAY_MS: u32 = 5_000;

// ───────────────────────────────────────────────────────────────
// MeasurementLoop
// ───────────────────────────────────────────────────────────────

/// The measurement loop orchestrates all domain logic.
pub struct MeasurementLoop<B> {
    fsm: Fsm<B>,
    ctx: FsmContext<B>,
    config_dirty: bool,
    dirty_since_ms: u32,
}

impl<B: Board> MeasurementLoop<B> {
    /// Construct the loop from configuration, the board and the sensors.
    ///
    /// Does **not** start the FSM; call [`begin`](Self::begin) next.
    pub fn new(config: SystemConfig, board: B, sensors: SensorHub) -> Self {
        let ctx = FsmContext::new(config, board, sensors);
        let fsm = Fsm::new(build_state_table(), StateId::Initial);
        Self {
            fsm,
            ctx,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring up the sensors and start the FSM.  Settles in `Inactive`.
    pub fn begin(&mut self, sink: &mut impl EventSink) {
        for name in self.ctx.sensors.init_all() {
            self.ctx.emit(AppEvent::SensorAbsent(name));
        }
        self.fsm.start(&mut self.ctx);
        self.publish(sink);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("MeasurementLoop started in {}", self.fsm.current_name());
    }

    /// One pass of the cooperative loop.
    ///
    /// Samples CO2 opportunistically and latches timer and transport
    /// events.  The FSM is evaluated only when one of them happened, then
    /// the external-power flag is refreshed.
    pub fn poll(&mut self, sink: &mut impl EventSink) {
        let window = self.ctx.config.co2_ready_window_ms;
        self.ctx.sensors.poll_co2(window);

        let now = self.ctx.now();
        let mut event = self.ctx.settle.poll(now);

        if let Some(delivered) = self.ctx.board.take_completion() {
            self.complete_transmission(delivered);
            event = true;
        }

        if self.ctx.uplink_timer.peek_ticks(now) != 0 {
            event = true;
        }

        // Inactive with nothing requested: the timer is not ours to answer.
        if !self.ctx.active && !self.ctx.requests.active {
            event = false;
        }

        if event {
            self.fsm.eval(&mut self.ctx);
        }

        let vbus = self.ctx.board.read_vbus();
        let external = vbus > self.ctx.config.external_power_threshold_v;
        if external != self.ctx.on_external_power {
            info!(
                "MeasurementLoop: external power {} (vbus {:.2} V)",
                if external { "on" } else { "off" },
                vbus
            );
            self.ctx.on_external_power = external;
        }

        self.publish(sink);
    }

    /// Ask the loop to start (`true`) or stop (`false`) measuring.
    pub fn request_active(&mut self, enable: bool, sink: &mut impl EventSink) {
        if enable {
            self.ctx.requests.active = true;
        } else {
            self.ctx.requests.inactive = true;
        }
        self.fsm.eval(&mut self.ctx);
        self.publish(sink);
    }

    /// Change the uplink period and the number of cycles before it reverts
    /// to the permanent period.  Evaluates right away if the new period
    /// already makes a tick pending.
    pub fn set_tx_cycle_time(&mut self, secs: u32, count: u32, sink: &mut impl EventSink) {
        info!("MeasurementLoop: tx cycle {}s for {} uplinks", secs, count);
        self.ctx.set_tx_cycle_time(secs, count);
        let now = self.ctx.now();
        if self.ctx.uplink_timer.peek_ticks(now) != 0 {
            self.fsm.eval(&mut self.ctx);
            self.publish(sink);
        }
    }

    /// Stop for good.  The FSM moves to `Final`.
    pub fn end(&mut self, sink: &mut impl EventSink) {
        self.ctx.requests.exit = true;
        self.fsm.eval(&mut self.ctx);
        self.publish(sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (console, downlink, provisioning).
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::Activate => self.request_active(true, sink),
            AppCommand::Deactivate => self.request_active(false, sink),
            AppCommand::SetTxCycle { secs, count } => {
                if secs == 0 || secs > MAX_TX_CYCLE_SECS {
                    warn!("MeasurementLoop: ignoring tx cycle of {}s", secs);
                    return;
                }
                self.set_tx_cycle_time(secs, count, sink);
            }
            AppCommand::SetOperatingFlags(flags) => {
                self.mark_config_dirty();
                self.ctx.config.operating_flags = flags;
                info!("Operating flags set to 0x{:08x}", flags.bits());
            }
            AppCommand::UpdateConfig(new_config) => match new_config.validate() {
                Ok(()) => {
                    self.mark_config_dirty();
                    self.apply_config(new_config, sink);
                    info!("Configuration updated at runtime");
                }
                Err(e) => warn!("Configuration rejected: {}", e),
            },
            AppCommand::Stop => self.end(sink),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Whether the loop has been activated and not deactivated since.
    pub fn is_active(&self) -> bool {
        self.ctx.active
    }

    /// Copy of the last message handed to the transport.
    pub fn last_uplink(&self) -> &[u8] {
        self.ctx.log_buffer.as_slice()
    }

    /// Completed uplinks since start, successful or not.
    pub fn uplinks(&self) -> u32 {
        self.ctx.uplinks
    }

    pub fn on_external_power(&self) -> bool {
        self.ctx.on_external_power
    }

    /// How long the outer loop should idle before the next `poll()`.
    pub fn idle_hint(&self) -> u32 {
        self.ctx.config.idle_ms()
    }

    /// Current uplink period (seconds).
    pub fn tx_cycle_secs(&self) -> u32 {
        self.ctx.tx_cycle_secs
    }

    /// Fast cycles left before the permanent period applies.
    pub fn tx_cycle_count(&self) -> u32 {
        self.ctx.tx_cycle_count
    }

    pub fn operating_flags(&self) -> OperatingFlags {
        self.ctx.config.operating_flags
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> SystemConfig {
        self.ctx.config.clone()
    }

    pub fn board(&self) -> &B {
        &self.ctx.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.ctx.board
    }

    pub fn sensors(&self) -> &SensorHub {
        &self.ctx.sensors
    }

    // ── Internal ──────────────────────────────────────────────

    /// Swap in a validated config and push it to the parts that keep
    /// their own copy: the gas cells and the uplink cadence.
    fn apply_config(&mut self, new_config: SystemConfig, sink: &mut impl EventSink) {
        let old = core::mem::replace(&mut self.ctx.config, new_config);
        let new = &self.ctx.config;

        if new.gas != old.gas {
            self.ctx.sensors.apply_gas_calibration(&new.gas);
        }

        let fast_changed =
            new.tx_cycle_secs != old.tx_cycle_secs || new.tx_cycle_count != old.tx_cycle_count;
        let permanent_changed = new.tx_cycle_permanent_secs != old.tx_cycle_permanent_secs;
        if fast_changed {
            let (secs, count) = (new.tx_cycle_secs, new.tx_cycle_count);
            self.set_tx_cycle_time(secs, count, sink);
        } else if permanent_changed && self.ctx.tx_cycle_count == 0 {
            let secs = new.tx_cycle_permanent_secs;
            self.set_tx_cycle_time(secs, 0, sink);
        }
    }

    fn complete_transmission(&mut self, delivered: bool) {
        if !self.ctx.tx.pending {
            warn!("MeasurementLoop: completion with no uplink pending");
            return;
        }
        self.ctx.tx.finish(delivered);
        let result = if delivered {
            Ok(())
        } else {
            warn!("MeasurementLoop: uplink not delivered");
            Err(TransmitError::NotDelivered)
        };
        self.ctx.emit(AppEvent::UplinkDone(result));
    }

    fn publish(&mut self, sink: &mut impl EventSink) {
        while let Some(event) = self.ctx.take_event() {
            sink.emit(&event);
        }
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.  Called by `handle_command`.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = self.ctx.now();
        }
    }

    /// Save once the config has been stable for a few seconds.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        let since = self.ctx.now().wrapping_sub(self.dirty_since_ms);
        if since < CONFIG_SAVE_DELAY_MS {
            return false;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before power-down).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved before shutdown");
            }
            Err(e) => warn!("Config force-save failed: {}", e),
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
