//! Monotone phase broadcast between the orchestrator and its workers.
//!
//! The run progresses through a fixed ladder of phases. The orchestrator
//! (and, for the final rung, the prescanning worker) advances the shared
//! state; every other thread blocks on the rung it needs. Phases only move
//! forward; an attempted regression is a programming error and panics.

use std::sync::{Condvar, Mutex};

/// The rungs of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    GeometryLoaded,
    MaterialsLoaded,
    PrimariesLoaded,
    PrescanDone,
}

/// Condvar-backed broadcast of the current [`Phase`].
pub struct PhaseBoard {
    state: Mutex<Phase>,
    changed: Condvar,
}

impl PhaseBoard {
    pub fn new() -> Self {
        PhaseBoard {
            state: Mutex::new(Phase::Init),
            changed: Condvar::new(),
        }
    }

    /// Moves the board forward to `next` and wakes every waiter.
    ///
    /// # Panics
    ///
    /// Panics if `next` is behind the current phase.
    pub fn advance(&self, next: Phase) {
        let mut state = self.state.lock().unwrap();
        assert!(
            next >= *state,
            "phase regression: {:?} after {:?}",
            next,
            *state
        );
        if next > *state {
            *state = next;
            self.changed.notify_all();
        }
    }

    /// Blocks until the board reaches at least `target`.
    pub fn wait_for(&self, target: Phase) {
        let mut state = self.state.lock().unwrap();
        while *state < target {
            state = self.changed.wait(state).unwrap();
        }
    }

    /// The phase the board is currently at.
    pub fn current(&self) -> Phase {
        *self.state.lock().unwrap()
    }
}

impl Default for PhaseBoard {
    fn default() -> Self {
        Self::new()
    }
}
