//! In-process robot platform
//!
//! Stands in for the real robot so the patrol loop can run end to end: goTo
//! requests play back a short status sequence on the shared `EventHub`, and
//! photos are only counted.

use crate::capture::CaptureClient;
use crate::common::{same_location, Point2D, WaypointId};
use crate::config::SimulationConfig;
use crate::error::{PatrolError, Result};
use crate::navigation::waypoints::{SavedLocations, WaypointStore};
use crate::navigation::{NavigationClient, NavigationUpdate, SpeedLevel};
use crate::platform::{EventHub, PlatformClient};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Steps reported between departure and arrival
const TRAVEL_STEPS: u32 = 4;

/// Simulated navigation base, head and status bar
pub struct SimulatedRobot {
    hub: Arc<EventHub>,
    runtime: Handle,
    locations: SavedLocations,
    names: Vec<WaypointId>,
    travel_time: Duration,
    abort_at: Vec<String>,
    position: Arc<Mutex<Point2D>>,
    next_request: AtomicI32,
    heading: AtomicI32,
    tilt: AtomicI32,
    top_bar_hidden: AtomicUsize,
}

impl SimulatedRobot {
    pub fn new(config: &SimulationConfig, hub: Arc<EventHub>, runtime: Handle) -> Self {
        SimulatedRobot {
            hub,
            runtime,
            locations: SavedLocations::new(config.waypoints.iter().cloned()),
            names: config.waypoints.clone(),
            travel_time: Duration::from_millis(config.travel_time_ms),
            abort_at: config.abort_at.clone(),
            position: Arc::new(Mutex::new((0.0, 0.0))),
            next_request: AtomicI32::new(0),
            heading: AtomicI32::new(0),
            tilt: AtomicI32::new(0),
            top_bar_hidden: AtomicUsize::new(0),
        }
    }

    /// Report the robot as ready
    pub fn power_on(&self) {
        self.hub.emit_robot_ready(true);
    }

    /// Map coordinates of a saved location: spaced two meters apart on a circle
    fn coordinates_of(&self, waypoint: &str) -> Point2D {
        let count = self.names.len().max(1) as f32;
        let index = self
            .names
            .iter()
            .position(|name| same_location(name, waypoint))
            .unwrap_or(0) as f32;
        let angle = index / count * std::f32::consts::TAU;
        let radius = 2.0 * count / std::f32::consts::TAU;
        (radius * angle.cos(), radius * angle.sin())
    }

    pub fn heading_degrees(&self) -> i32 {
        self.heading.load(Ordering::Relaxed)
    }

    pub fn tilt_degrees(&self) -> i32 {
        self.tilt.load(Ordering::Relaxed)
    }

    pub fn top_bar_hidden_count(&self) -> usize {
        self.top_bar_hidden.load(Ordering::Relaxed)
    }
}

impl WaypointStore for SimulatedRobot {
    fn list_waypoints(&self) -> Result<Vec<WaypointId>> {
        self.locations.list_waypoints()
    }
}

impl NavigationClient for SimulatedRobot {
    fn go_to(&self, waypoint: &WaypointId, speed: SpeedLevel) {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed) + 1;
        let aborts = self.abort_at.iter().any(|name| same_location(name, waypoint));
        let travel = match speed {
            SpeedLevel::Slow => self.travel_time,
            SpeedLevel::Medium => self.travel_time * 2 / 3,
            SpeedLevel::High => self.travel_time / 2,
        };
        let goal = self.coordinates_of(waypoint);
        let hub = Arc::clone(&self.hub);
        let position = Arc::clone(&self.position);
        let location = waypoint.clone();

        debug!("Simulating goTo {} (request {})", location, id);
        self.runtime.spawn(async move {
            hub.emit_navigation_status(&NavigationUpdate::new(&location, "start", id, ""));
            hub.emit_navigation_status(&NavigationUpdate::new(&location, "going", id, ""));

            let start = position.lock().map(|p| *p).unwrap_or_default();
            let steps = if aborts { TRAVEL_STEPS / 2 } else { TRAVEL_STEPS };
            for step in 1..=steps {
                tokio::time::sleep(travel / TRAVEL_STEPS).await;
                let t = step as f32 / TRAVEL_STEPS as f32;
                let here = (
                    start.0 + (goal.0 - start.0) * t,
                    start.1 + (goal.1 - start.1) * t,
                );
                if let Ok(mut guard) = position.lock() {
                    *guard = here;
                }
                hub.emit_position(here.0, here.1);
            }

            if aborts {
                hub.emit_navigation_status(&NavigationUpdate::new(
                    &location,
                    "abort",
                    id,
                    "path blocked",
                ));
            } else {
                hub.emit_navigation_status(&NavigationUpdate::new(&location, "complete", id, ""));
            }
        });
    }

    fn turn_by(&self, degrees: i32, _speed: f32) {
        let heading = (self.heading.load(Ordering::Relaxed) + degrees).rem_euclid(360);
        self.heading.store(heading, Ordering::Relaxed);
    }
}

impl PlatformClient for SimulatedRobot {
    fn tilt_angle(&self, degrees: i32, _speed: f32) {
        self.tilt.store(degrees, Ordering::Relaxed);
    }

    fn hide_top_bar(&self) {
        self.top_bar_hidden.fetch_add(1, Ordering::Relaxed);
    }
}

/// Camera that counts shots and fails every `fail_every`-th one
#[derive(Debug, Default)]
pub struct SimulatedCamera {
    shots: AtomicUsize,
    failures: AtomicUsize,
    fail_every: Option<usize>,
}

impl SimulatedCamera {
    pub fn failing_every(n: usize) -> Self {
        SimulatedCamera {
            fail_every: Some(n.max(1)),
            ..Self::default()
        }
    }

    pub fn shots(&self) -> usize {
        self.shots.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn take_picture(&self, shot: usize) -> Result<String> {
        match self.fail_every {
            Some(n) if shot % n == 0 => Err(PatrolError::Collaborator(format!(
                "capture {} failed: camera busy",
                shot
            ))),
            _ => Ok(format!("IMG_{:05}.jpg", shot)),
        }
    }
}

impl CaptureClient for SimulatedCamera {
    fn capture_photo(&self) {
        let shot = self.shots.fetch_add(1, Ordering::Relaxed) + 1;
        match self.take_picture(shot) {
            Ok(name) => info!("Captured {}", name),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("{}", e);
            }
        }
    }
}
