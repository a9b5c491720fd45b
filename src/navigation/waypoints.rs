//! Saved waypoint registry

use crate::common::WaypointId;
use crate::error::{PatrolError, Result};
use std::sync::RwLock;

/// Source of the ordered waypoint list a patrol visits
pub trait WaypointStore: Send + Sync {
    /// List saved waypoints in patrol order.
    ///
    /// Fails with `PatrolError::EmptyStore` when nothing is saved.
    fn list_waypoints(&self) -> Result<Vec<WaypointId>>;
}

/// In-memory list of saved locations
#[derive(Debug, Default)]
pub struct SavedLocations {
    locations: RwLock<Vec<WaypointId>>,
}

impl SavedLocations {
    /// Create a store holding `locations` in order
    pub fn new<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<WaypointId>,
    {
        SavedLocations {
            locations: RwLock::new(locations.into_iter().map(Into::into).collect()),
        }
    }

    /// Replace the saved locations. A running patrol keeps its own copy until restarted.
    pub fn replace<I, S>(&self, locations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<WaypointId>,
    {
        if let Ok(mut guard) = self.locations.write() {
            *guard = locations.into_iter().map(Into::into).collect();
        }
    }
}

impl WaypointStore for SavedLocations {
    fn list_waypoints(&self) -> Result<Vec<WaypointId>> {
        let locations = self
            .locations
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        if locations.is_empty() {
            Err(PatrolError::EmptyStore)
        } else {
            Ok(locations)
        }
    }
}
