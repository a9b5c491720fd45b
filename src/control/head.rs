//! Head tilt commands

use crate::error::{PatrolError, Result};
use std::ops::RangeInclusive;

/// Tilt angles the head accepts, in degrees
pub const TILT_RANGE: RangeInclusive<i32> = -25..=55;

/// Tilt speeds the head accepts
pub const TILT_SPEED_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// A head tilt that has passed range validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadTilt {
    degrees: i32,
    speed: f32,
}

impl HeadTilt {
    /// Validate a tilt request
    pub fn new(degrees: i32, speed: f32) -> Result<Self> {
        if TILT_RANGE.contains(&degrees) && TILT_SPEED_RANGE.contains(&speed) {
            Ok(HeadTilt { degrees, speed })
        } else {
            Err(PatrolError::InvalidTilt { degrees, speed })
        }
    }

    pub fn degrees(&self) -> i32 {
        self.degrees
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }
}
