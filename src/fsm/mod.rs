//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable                                              │
//! │  ┌──────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ StateId  │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├──────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Initial  │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ Inactive │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ Warmup   │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ Measure  │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ Transmit │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ Sleeping │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ Final    │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  └──────────┴───────────┴──────────┴───────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Fsm::eval`] calls `on_update` for the **current** state.  If it
//! returns `Some(next_id)`, the engine runs `on_exit` for the current state,
//! then `on_enter` for the next, and evaluates again until a state answers
//! `None`.  All functions receive `&mut FsmContext` which holds the board,
//! the sensors, the snapshot, the timers and the pending requests.

pub mod context;
pub mod states;

#[cfg(test)]
pub(crate) mod fake_board;

use context::FsmContext;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::config::DebugFlags;

/// Upper bound on transitions chained inside one evaluation.
const MAX_CHAIN: usize = 2 * StateId::COUNT;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all possible measurement-loop states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Initial = 0,
    Inactive = 1,
    Warmup = 2,
    Measure = 3,
    Transmit = 4,
    Sleeping = 5,
    Final = 6,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 7;

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Final` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Initial,
            1 => Self::Inactive,
            2 => Self::Warmup,
            3 => Self::Measure,
            4 => Self::Transmit,
            5 => Self::Sleeping,
            6 => Self::Final,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Final
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn<B> = fn(&mut FsmContext<B>);

/// Signature for the update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn<B> = fn(&mut FsmContext<B>) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array, no heap, no `dyn`.
pub struct StateDescriptor<B> {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<B>>,
    pub on_exit: Option<StateActionFn<B>>,
    pub on_update: StateUpdateFn<B>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]); the mutable
/// [`FsmContext`] is threaded through every handler call.
pub struct Fsm<B> {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor<B>; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl<B> Fsm<B> {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor<B>; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state, then evaluate.
    /// Call once after construction.
    pub fn start(&mut self, ctx: &mut FsmContext<B>) {
        info!("FSM starting in state: {}", self.current_name());
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
        self.eval(ctx);
    }

    /// One update of the current state, with the transition it asks for.
    /// Returns `true` if the state changed.
    pub fn tick(&mut self, ctx: &mut FsmContext<B>) -> bool {
        match (self.table[self.current].on_update)(ctx) {
            Some(next_id) if next_id as usize != self.current => {
                self.transition(next_id, ctx);
                true
            }
            _ => false,
        }
    }

    /// Evaluate until the current state stops asking for a transition.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    /// 3. Repeat with the new state.
    pub fn eval(&mut self, ctx: &mut FsmContext<B>) {
        for _ in 0..MAX_CHAIN {
            if !self.tick(ctx) {
                return;
            }
        }
        warn!(
            "FSM: evaluation did not settle, stopping in {}",
            self.current_name()
        );
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// Name of the current state.
    pub fn current_name(&self) -> &'static str {
        self.table[self.current].name
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext<B>) {
        let next_idx = next_id as usize;
        let from = self.current_state();

        if ctx.debug_enabled(DebugFlags::TRACE) {
            info!(
                "FSM transition: {} -> {}",
                self.table[self.current].name, self.table[next_idx].name
            );
        }

        // Exit current state
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        ctx.emit(AppEvent::StateChanged { from, to: next_id });

        // Enter new state
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
