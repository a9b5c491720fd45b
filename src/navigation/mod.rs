//! Navigation interface of the robot platform
//!
//! The platform owns path planning and motor control. This crate only issues
//! goTo / turnBy requests and reacts to the status events the platform
//! delivers for them.
pub mod waypoints;

use crate::common::WaypointId;
use serde::Deserialize;
use std::fmt;

/// Speed level requested for a goTo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedLevel {
    #[default]
    Slow,
    Medium,
    High,
}

/// Navigation commands understood by the robot platform.
///
/// Both calls return immediately. The outcome of a `go_to` arrives later as a
/// navigation status event; `turn_by` has no reported outcome. Implementations
/// must deliver at most one terminal status (`complete` or `abort`) per goTo.
pub trait NavigationClient: Send + Sync {
    /// Navigate to a saved location
    fn go_to(&self, waypoint: &WaypointId, speed: SpeedLevel);

    /// Rotate in place by `degrees` at `speed` in [0, 1]
    fn turn_by(&self, degrees: i32, speed: f32);
}

/// Status vocabulary of a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationStatus {
    Start,
    Calculating,
    Going,
    Reposing,
    Complete,
    Abort,
    /// Anything the platform reports that is not modelled here
    Other(String),
}

impl NavigationStatus {
    /// Parse a platform status string, ignoring case
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "start" => NavigationStatus::Start,
            "calculating" => NavigationStatus::Calculating,
            "going" => NavigationStatus::Going,
            "reposing" => NavigationStatus::Reposing,
            "complete" => NavigationStatus::Complete,
            "abort" => NavigationStatus::Abort,
            _ => NavigationStatus::Other(status.to_string()),
        }
    }

    /// Whether this status ends the request it belongs to
    pub fn is_terminal(&self) -> bool {
        matches!(self, NavigationStatus::Complete | NavigationStatus::Abort)
    }
}

impl fmt::Display for NavigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavigationStatus::Start => "start",
            NavigationStatus::Calculating => "calculating",
            NavigationStatus::Going => "going",
            NavigationStatus::Reposing => "reposing",
            NavigationStatus::Complete => "complete",
            NavigationStatus::Abort => "abort",
            NavigationStatus::Other(other) => other,
        };
        f.write_str(name)
    }
}

/// A navigation status event as delivered by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationUpdate {
    pub location: String,
    pub status: NavigationStatus,
    pub id: i32,
    pub description: String,
}

impl NavigationUpdate {
    pub fn new(location: &str, status: &str, id: i32, description: &str) -> Self {
        NavigationUpdate {
            location: location.to_string(),
            status: NavigationStatus::parse(status),
            id,
            description: description.to_string(),
        }
    }
}
