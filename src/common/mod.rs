//! Common utilities and types for the patrol robot

/// Common types and utilities used across the codebase
pub mod types {
    /// A 2D point in the platform's map frame
    pub type Point2D = (f32, f32);

    /// Name of a saved location, as the platform's location registry reports it
    pub type WaypointId = String;
}

pub use types::{Point2D, WaypointId};

/// Case-insensitive comparison for location names reported by the platform.
pub fn same_location(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
