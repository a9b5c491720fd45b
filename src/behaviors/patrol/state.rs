//! Patrol state, cursor and sweep progress

use crate::common::WaypointId;

/// Completed turn-and-capture actions at the current waypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepProgress {
    turns_done: u32,
}

impl SweepProgress {
    pub fn turns_done(&self) -> u32 {
        self.turns_done
    }

    pub fn record_turn(&mut self) {
        self.turns_done += 1;
    }

    pub fn is_complete(&self, turns: u32) -> bool {
        self.turns_done >= turns
    }
}

/// State of the patrol loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatrolState {
    /// Not patrolling
    Idle,
    /// A goTo for `target` is outstanding
    NavigatingToWaypoint { target: WaypointId },
    /// Arrived at `target`; settling or sweeping
    PerformingSweep {
        target: WaypointId,
        progress: SweepProgress,
    },
    /// The last goTo was aborted; waits for a new start
    Aborted,
}

impl PatrolState {
    /// Waypoint the current segment is about, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            PatrolState::NavigatingToWaypoint { target }
            | PatrolState::PerformingSweep { target, .. } => Some(target),
            PatrolState::Idle | PatrolState::Aborted => None,
        }
    }
}

/// Position in the waypoint list of the running patrol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Step to the next waypoint, wrapping at `len`
    pub fn advance(&mut self, len: usize) {
        if len > 0 {
            self.index = (self.index + 1) % len;
        }
    }
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq)]
pub struct PatrolSnapshot {
    pub state: PatrolState,
    pub cursor: usize,
    pub active: bool,
    pub generation: u64,
    pub waypoints: Vec<WaypointId>,
    pub destroyed: bool,
}
