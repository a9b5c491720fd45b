//! Position tracking
//!
//! Purely observational: nothing in the patrol loop reads these values to make
//! a decision.

use nalgebra::{distance, Point2};
use std::sync::RwLock;
use tracing::debug;

/// Last known position in the platform's map frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotPosition {
    pub point: Point2<f32>,
    /// Number of position updates received so far
    pub sequence: u64,
    /// Straight-line distance summed over consecutive updates (meters)
    pub travelled: f32,
}

impl RobotPosition {
    pub fn x(&self) -> f32 {
        self.point.x
    }

    pub fn y(&self) -> f32 {
        self.point.y
    }
}

/// A position tracker for the robot
#[derive(Debug, Default)]
pub struct PositionTracker {
    latest: RwLock<Option<RobotPosition>>,
}

impl PositionTracker {
    /// Create a new tracker with no known position
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a position update and emit a telemetry record
    pub fn on_position_changed(&self, x: f32, y: f32) {
        let point = Point2::new(x, y);
        let Ok(mut guard) = self.latest.write() else {
            return;
        };
        let next = match *guard {
            Some(prev) => RobotPosition {
                point,
                sequence: prev.sequence + 1,
                travelled: prev.travelled + distance(&prev.point, &point),
            },
            None => RobotPosition {
                point,
                sequence: 1,
                travelled: 0.0,
            },
        };
        *guard = Some(next);
        drop(guard);

        debug!(
            target: "telemetry",
            x,
            y,
            travelled = next.travelled,
            "Current position"
        );
    }

    /// Get the current position snapshot
    pub fn position(&self) -> Option<RobotPosition> {
        self.latest.read().ok().and_then(|guard| *guard)
    }
}
