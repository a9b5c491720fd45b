//! Waypoint patrol with a photographic sweep at each stop
//!
//! `PatrolController` is the host-facing handle. Every state change happens in
//! a single dispatch task that drains an mpsc queue, so host calls, platform
//! callbacks and timer ticks are serialized without holding a lock while the
//! platform is called. Platform callbacks only enqueue, which lets a platform
//! deliver a status event from inside `go_to` without deadlocking.
mod machine;
mod state;

pub use state::{Cursor, PatrolSnapshot, PatrolState, SweepProgress};

use self::machine::{PatrolEvent, PatrolMachine};
use crate::capture::CaptureClient;
use crate::config::PatrolConfig;
use crate::control::HeadTilt;
use crate::error::{PatrolError, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::navigation::waypoints::WaypointStore;
use crate::navigation::NavigationClient;
use crate::perception::{PositionTracker, RobotPosition};
use crate::platform::{ListenerId, PlatformClient, RobotEvents};
use crate::scheduler::Scheduler;
use std::any::Any;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// External capabilities the patrol loop drives or listens to
#[derive(Clone)]
pub struct Collaborators {
    pub waypoints: Arc<dyn WaypointStore>,
    pub navigation: Arc<dyn NavigationClient>,
    pub platform: Arc<dyn PlatformClient>,
    pub capture: Arc<dyn CaptureClient>,
    pub events: Arc<dyn RobotEvents>,
    pub scheduler: Arc<dyn Scheduler>,
}

/// Patrol controller for the robot
pub struct PatrolController {
    base: LifecycleNodeBase,
    queue: mpsc::UnboundedSender<PatrolEvent>,
    events: Arc<dyn RobotEvents>,
    platform: Arc<dyn PlatformClient>,
    tracker: Arc<PositionTracker>,
    listeners: Mutex<Vec<ListenerId>>,
    dispatch: JoinHandle<()>,
}

impl PatrolController {
    /// Create the controller and spawn its dispatch task on the current tokio runtime.
    ///
    /// Event sources are not subscribed until `subscribe` (or `on_configure`).
    pub fn new(config: &PatrolConfig, deps: Collaborators) -> Self {
        let (queue, mut rx) = mpsc::unbounded_channel();
        let mut machine = PatrolMachine::new(
            config.patrol.clone(),
            config.sweep.clone(),
            &deps,
            queue.downgrade(),
        );

        let dispatch = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                machine.handle(event);
            }
            debug!("Patrol dispatch loop finished");
        });

        PatrolController {
            base: LifecycleNodeBase::new("patrol_controller"),
            queue,
            events: deps.events,
            platform: deps.platform,
            tracker: Arc::new(PositionTracker::new()),
            listeners: Mutex::new(Vec::new()),
            dispatch,
        }
    }

    /// Register the ready, navigation-status and position listeners.
    /// Does nothing if they are already registered.
    pub fn subscribe(&self) {
        let Ok(mut listeners) = self.listeners.lock() else {
            return;
        };
        if !listeners.is_empty() {
            return;
        }

        let queue = self.queue.clone();
        listeners.push(self.events.add_robot_ready_listener(Box::new(move |ready| {
            let _ = queue.send(PatrolEvent::RobotReady(ready));
        })));

        let queue = self.queue.clone();
        listeners.push(
            self.events
                .add_navigation_status_listener(Box::new(move |update| {
                    let _ = queue.send(PatrolEvent::NavigationStatus(update.clone()));
                })),
        );

        let tracker = Arc::clone(&self.tracker);
        listeners.push(self.events.add_position_listener(Box::new(move |x, y| {
            tracker.on_position_changed(x, y);
        })));

        debug!("Subscribed {} listeners", listeners.len());
    }

    /// Begin patrolling from the first saved waypoint
    pub fn start_patrolling(&self) {
        self.send(PatrolEvent::Start);
    }

    /// Stop patrolling and cancel any pending sweep. An in-flight goTo is not
    /// cancelled on the platform; its status is ignored.
    pub fn stop_patrolling(&self) {
        self.send(PatrolEvent::Stop);
    }

    /// Remove all listeners and cancel all timers. Safe to call repeatedly.
    pub fn destroy_patrol(&self) {
        let removed: Vec<ListenerId> = match self.listeners.lock() {
            Ok(mut listeners) => listeners.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for id in &removed {
            self.events.remove_listener(*id);
        }
        if !removed.is_empty() {
            debug!("Removed {} listeners", removed.len());
        }
        self.send(PatrolEvent::Destroy);
    }

    /// Tilt the head. Out-of-range requests are logged and not sent to the platform.
    pub fn tilt_head(&self, degrees: i32, speed: f32) {
        match HeadTilt::new(degrees, speed) {
            Ok(tilt) => {
                info!("Tilting head to {} degrees", tilt.degrees());
                self.platform.tilt_angle(tilt.degrees(), tilt.speed());
            }
            Err(e) => warn!("{}", e),
        }
    }

    /// Last reported position, if any
    pub fn position(&self) -> Option<RobotPosition> {
        self.tracker.position()
    }

    /// Whether the dispatch task is still draining events
    pub fn is_running(&self) -> bool {
        !self.dispatch.is_finished()
    }

    /// Number of listeners currently registered by this controller
    pub fn subscription_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// State after every previously enqueued event has been handled
    pub async fn snapshot(&self) -> Result<PatrolSnapshot> {
        let (reply, response) = oneshot::channel();
        self.queue
            .send(PatrolEvent::Snapshot(reply))
            .map_err(|_| PatrolError::ControllerStopped)?;
        response.await.map_err(|_| PatrolError::ControllerStopped)
    }

    fn send(&self, event: PatrolEvent) {
        if self.queue.send(event).is_err() {
            warn!("Patrol dispatch loop is not running");
        }
    }
}

impl Drop for PatrolController {
    fn drop(&mut self) {
        self.destroy_patrol();
    }
}

impl LifecycleNode for PatrolController {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn on_configure(&mut self) -> Result<()> {
        self.subscribe();
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        self.start_patrolling();
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        self.stop_patrolling();
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        self.destroy_patrol();
        self.base.set_state(State::Finalized);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
