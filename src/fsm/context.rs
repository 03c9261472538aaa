//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: the injected board and sensors, the cycle's snapshot and
//! uplink buffers, the timers, pending requests, and the transmit status.
//! Think of it as the "blackboard" in a blackboard architecture.

use heapless::Deque;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::Board;
use crate::config::{DebugFlags, SystemConfig};
use crate::sensors::SensorHub;
use crate::telemetry::{Measurement, UplinkBuffer};
use crate::timer::{SettleTimer, UplinkTimer};

/// Events buffered between two drains by the service.
const EVENT_QUEUE_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// Requests and transmit status
// ---------------------------------------------------------------------------

/// Requests from the outside world, honoured by the states that check them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requests {
    pub active: bool,
    pub inactive: bool,
    pub exit: bool,
}

impl Requests {
    /// Drop pending activate/deactivate requests.  `exit` is sticky.
    pub fn clear(&mut self) {
        self.active = false;
        self.inactive = false;
    }
}

/// State of the uplink launched from `Transmit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxStatus {
    pub pending: bool,
    pub complete: bool,
    pub error: bool,
}

impl TxStatus {
    /// Record the outcome reported by the transport.
    pub fn finish(&mut self, success: bool) {
        self.pending = false;
        self.complete = true;
        self.error = !success;
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext<B> {
    // -- Injected collaborators --
    pub board: B,
    pub sensors: SensorHub,

    // -- Configuration --
    pub config: SystemConfig,

    // -- Cycle data --
    /// Snapshot being filled for the current cycle.
    pub measurement: Measurement,
    /// Message built by the last `Transmit` entry.
    pub tx_buffer: UplinkBuffer,
    /// Copy of every message sent, kept for the log record.
    pub log_buffer: UplinkBuffer,

    // -- Timing --
    pub uplink_timer: UplinkTimer,
    pub settle: SettleTimer,
    /// Current uplink period (seconds).
    pub tx_cycle_secs: u32,
    /// Fast cycles left before reverting to the permanent period.
    pub tx_cycle_count: u32,

    // -- Flags --
    pub requests: Requests,
    pub active: bool,
    pub tx: TxStatus,
    /// The sleep alert for the current `Sleeping` stay has been shown.
    pub printed_sleeping: bool,
    /// Bus voltage says the node is on external power.
    pub on_external_power: bool,
    /// Completed uplinks since start, successful or not.
    pub uplinks: u32,

    events: Deque<AppEvent, EVENT_QUEUE_DEPTH>,
}

impl<B: Board> FsmContext<B> {
    /// Create a new context.  The uplink period starts now.
    pub fn new(config: SystemConfig, board: B, sensors: SensorHub) -> Self {
        let now = board.now_millis();
        let tx_cycle_secs = config.tx_cycle_secs;
        let tx_cycle_count = config.tx_cycle_count;
        Self {
            board,
            sensors,
            measurement: Measurement::new(),
            tx_buffer: UplinkBuffer::new(),
            log_buffer: UplinkBuffer::new(),
            uplink_timer: UplinkTimer::new(now, secs_to_ms(tx_cycle_secs)),
            settle: SettleTimer::default(),
            tx_cycle_secs,
            tx_cycle_count,
            requests: Requests::default(),
            active: false,
            tx: TxStatus::default(),
            printed_sleeping: false,
            on_external_power: false,
            uplinks: 0,
            config,
            events: Deque::new(),
        }
    }

    /// Current tick from the power port.
    pub fn now(&self) -> u32 {
        self.board.now_millis()
    }

    /// Change the uplink period and the fast-cycle countdown.
    pub fn set_tx_cycle_time(&mut self, secs: u32, count: u32) {
        self.tx_cycle_secs = secs;
        self.tx_cycle_count = count;
        self.uplink_timer.set_interval(secs_to_ms(secs));
    }

    /// Step the fast-cycle countdown after a completed uplink.
    pub fn update_tx_cycle_time(&mut self) {
        match self.tx_cycle_count {
            0 => {}
            1 => {
                let permanent = self.config.tx_cycle_permanent_secs;
                info!("Uplink: resetting tx cycle to default: {}s", permanent);
                self.set_tx_cycle_time(permanent, 0);
            }
            n => self.tx_cycle_count = n - 1,
        }
    }
}

impl<B> FsmContext<B> {
    /// Whether a diagnostic level is enabled.
    pub fn debug_enabled(&self, flag: DebugFlags) -> bool {
        self.config.debug_flags.contains(flag)
    }

    /// Queue an event for the service to publish.
    pub fn emit(&mut self, event: AppEvent) {
        if let Err(dropped) = self.events.push_back(event) {
            warn!("FsmContext: event queue full, dropping {:?}", dropped);
        }
    }

    /// Oldest queued event.
    pub fn take_event(&mut self) -> Option<AppEvent> {
        self.events.pop_front()
    }
}

/// Seconds to milliseconds, saturating.
pub fn secs_to_ms(secs: u32) -> u32 {
    secs.saturating_mul(1_000)
}
