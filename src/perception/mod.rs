//! Perception module for the patrol robot
pub mod localization;

pub use localization::{PositionTracker, RobotPosition};
