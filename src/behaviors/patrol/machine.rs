//! The patrol state machine
//!
//! Runs inside the controller's dispatch task, one event at a time. Nothing
//! here blocks: waiting is done by scheduling a timer whose callback enqueues
//! an event tagged with the generation that was current when it was set.

use super::state::{Cursor, PatrolSnapshot, PatrolState, SweepProgress};
use super::Collaborators;
use crate::capture::CaptureClient;
use crate::common::{same_location, WaypointId};
use crate::config::{RouteConfig, SweepConfig};
use crate::error::PatrolError;
use crate::navigation::waypoints::WaypointStore;
use crate::navigation::{NavigationClient, NavigationStatus, NavigationUpdate};
use crate::platform::PlatformClient;
use crate::scheduler::{Scheduler, TimerHandle};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Everything the dispatch task reacts to
#[derive(Debug)]
pub(crate) enum PatrolEvent {
    Start,
    Stop,
    Destroy,
    RobotReady(bool),
    NavigationStatus(NavigationUpdate),
    SettleElapsed { generation: u64 },
    SweepTick { generation: u64 },
    Snapshot(oneshot::Sender<PatrolSnapshot>),
}

pub(crate) struct PatrolMachine {
    route: RouteConfig,
    sweep: SweepConfig,
    store: Arc<dyn WaypointStore>,
    navigation: Arc<dyn NavigationClient>,
    platform: Arc<dyn PlatformClient>,
    capture: Arc<dyn CaptureClient>,
    scheduler: Arc<dyn Scheduler>,
    queue: mpsc::WeakUnboundedSender<PatrolEvent>,

    state: PatrolState,
    waypoints: Vec<WaypointId>,
    cursor: Cursor,
    active: bool,
    destroyed: bool,
    /// Bumped whenever pending timers are invalidated
    generation: u64,
    settle_timer: Option<TimerHandle>,
    sweep_timer: Option<TimerHandle>,
}

impl PatrolMachine {
    pub(crate) fn new(
        route: RouteConfig,
        sweep: SweepConfig,
        deps: &Collaborators,
        queue: mpsc::WeakUnboundedSender<PatrolEvent>,
    ) -> Self {
        PatrolMachine {
            route,
            sweep,
            store: Arc::clone(&deps.waypoints),
            navigation: Arc::clone(&deps.navigation),
            platform: Arc::clone(&deps.platform),
            capture: Arc::clone(&deps.capture),
            scheduler: Arc::clone(&deps.scheduler),
            queue,
            state: PatrolState::Idle,
            waypoints: Vec::new(),
            cursor: Cursor::default(),
            active: false,
            destroyed: false,
            generation: 0,
            settle_timer: None,
            sweep_timer: None,
        }
    }

    pub(crate) fn handle(&mut self, event: PatrolEvent) {
        match event {
            PatrolEvent::Start => self.start(),
            PatrolEvent::Stop => self.stop(),
            PatrolEvent::Destroy => self.destroy(),
            PatrolEvent::RobotReady(ready) => self.on_robot_ready(ready),
            PatrolEvent::NavigationStatus(update) => self.on_navigation_status(update),
            PatrolEvent::SettleElapsed { generation } => self.on_settle_elapsed(generation),
            PatrolEvent::SweepTick { generation } => self.on_sweep_tick(generation),
            PatrolEvent::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    pub(crate) fn snapshot(&self) -> PatrolSnapshot {
        PatrolSnapshot {
            state: self.state.clone(),
            cursor: self.cursor.index(),
            active: self.active,
            generation: self.generation,
            waypoints: self.waypoints.clone(),
            destroyed: self.destroyed,
        }
    }

    fn start(&mut self) {
        if self.destroyed {
            warn!("Patrol was destroyed, ignoring start");
            return;
        }
        if self.active {
            info!("Already patrolling");
            return;
        }

        self.cancel_timers();
        match self.store.list_waypoints() {
            Ok(waypoints) if !waypoints.is_empty() => {
                info!("Starting patrol over {} waypoints", waypoints.len());
                self.waypoints = waypoints;
                self.cursor.reset();
                self.active = true;
                self.go_to_cursor();
            }
            Ok(_) | Err(PatrolError::EmptyStore) => {
                warn!("{}", PatrolError::EmptyStore);
                self.state = PatrolState::Idle;
            }
            Err(e) => {
                warn!("Failed to list waypoints: {}", e);
                self.state = PatrolState::Idle;
            }
        }
    }

    fn stop(&mut self) {
        if self.active {
            info!("Stopping patrol");
        }
        self.active = false;
        self.state = PatrolState::Idle;
        self.cancel_timers();
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        info!("Patrol destroyed");
        self.active = false;
        self.destroyed = true;
        self.state = PatrolState::Idle;
        self.cancel_timers();
    }

    fn on_robot_ready(&mut self, ready: bool) {
        if ready {
            info!("Robot is ready");
            self.platform.hide_top_bar();
        }
    }

    fn on_navigation_status(&mut self, update: NavigationUpdate) {
        debug!(
            "Location: {}, status: {} ({}: {})",
            update.location, update.status, update.id, update.description
        );
        if !self.active {
            debug!("Not patrolling, ignoring status {}", update.status);
            return;
        }
        if !update.status.is_terminal() {
            return;
        }

        let target = match &self.state {
            PatrolState::NavigatingToWaypoint { target } => target.clone(),
            other => {
                debug!(
                    "Ignoring {} for {}: no navigation outstanding ({:?})",
                    update.status, update.location, other
                );
                return;
            }
        };
        if !same_location(&update.location, &target) {
            debug!(
                "Ignoring {} for {}: current target is {}",
                update.status, update.location, target
            );
            return;
        }

        match update.status {
            NavigationStatus::Complete if same_location(&target, &self.route.home_waypoint) => {
                info!("Reached {}, skipping sweep", target);
                self.advance_and_go();
            }
            NavigationStatus::Complete => {
                info!(
                    "Arrived at {}, sweeping in {:?}",
                    target,
                    self.sweep.settle_delay()
                );
                self.state = PatrolState::PerformingSweep {
                    target,
                    progress: SweepProgress::default(),
                };
                self.schedule_settle();
            }
            NavigationStatus::Abort => {
                warn!("{}, stopping patrol", PatrolError::NavigationAbort { location: target });
                self.active = false;
                self.state = PatrolState::Aborted;
                self.cancel_timers();
            }
            _ => {}
        }
    }

    fn on_settle_elapsed(&mut self, generation: u64) {
        if !self.is_current(generation) {
            trace!("Dropping stale settle timer (generation {})", generation);
            return;
        }
        self.settle_timer = None;
        if matches!(self.state, PatrolState::PerformingSweep { .. }) {
            self.schedule_sweep();
        }
    }

    fn on_sweep_tick(&mut self, generation: u64) {
        if !self.is_current(generation) {
            trace!("Dropping stale sweep tick (generation {})", generation);
            return;
        }

        let finished = match &mut self.state {
            PatrolState::PerformingSweep { target, progress } => {
                if progress.is_complete(self.sweep.turns) {
                    info!("Sweep at {} complete", target);
                    true
                } else {
                    self.navigation
                        .turn_by(self.sweep.turn_degrees, self.sweep.turn_speed);
                    self.capture.capture_photo();
                    progress.record_turn();
                    debug!(
                        "Sweep at {}: turn {}/{}",
                        target,
                        progress.turns_done(),
                        self.sweep.turns
                    );
                    false
                }
            }
            _ => return,
        };

        if finished {
            if let Some(timer) = self.sweep_timer.take() {
                timer.cancel();
            }
            self.advance_and_go();
        }
    }

    fn advance_and_go(&mut self) {
        self.cursor.advance(self.waypoints.len());
        self.go_to_cursor();
    }

    fn go_to_cursor(&mut self) {
        let Some(target) = self.waypoints.get(self.cursor.index()).cloned() else {
            self.state = PatrolState::Idle;
            return;
        };
        info!("Going to {}", target);
        self.navigation.go_to(&target, self.route.speed_level);
        self.state = PatrolState::NavigatingToWaypoint { target };
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active && !self.destroyed && generation == self.generation
    }

    fn schedule_settle(&mut self) {
        let generation = self.generation;
        let queue = self.queue.clone();
        let handle = self.scheduler.schedule_once(
            self.sweep.settle_delay(),
            Box::new(move || {
                if let Some(tx) = queue.upgrade() {
                    let _ = tx.send(PatrolEvent::SettleElapsed { generation });
                }
            }),
        );
        self.settle_timer = Some(handle);
    }

    fn schedule_sweep(&mut self) {
        let generation = self.generation;
        let queue = self.queue.clone();
        let handle = self.scheduler.schedule_repeating(
            self.sweep.turn_interval(),
            Box::new(move || {
                if let Some(tx) = queue.upgrade() {
                    let _ = tx.send(PatrolEvent::SweepTick { generation });
                }
            }),
        );
        self.sweep_timer = Some(handle);
    }

    // Ticks already queued carry the old generation and are dropped on arrival.
    fn cancel_timers(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.settle_timer.take() {
            timer.cancel();
        }
        if let Some(timer) = self.sweep_timer.take() {
            timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::waypoints::SavedLocations;
    use crate::navigation::SpeedLevel;
    use crate::platform::EventHub;
    use crate::scheduler::{OnceTask, RepeatingTask};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        GoTo(String),
        Turn(i32),
        Capture,
        HideTopBar,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    impl NavigationClient for Recorder {
        fn go_to(&self, waypoint: &WaypointId, speed: SpeedLevel) {
            assert_eq!(speed, SpeedLevel::Slow);
            self.calls.lock().unwrap().push(Call::GoTo(waypoint.clone()));
        }

        fn turn_by(&self, degrees: i32, _speed: f32) {
            self.calls.lock().unwrap().push(Call::Turn(degrees));
        }
    }

    impl CaptureClient for Recorder {
        fn capture_photo(&self) {
            self.calls.lock().unwrap().push(Call::Capture);
        }
    }

    impl PlatformClient for Recorder {
        fn tilt_angle(&self, _degrees: i32, _speed: f32) {}

        fn hide_top_bar(&self) {
            self.calls.lock().unwrap().push(Call::HideTopBar);
        }
    }

    enum Pending {
        Once(Option<OnceTask>),
        Repeating(RepeatingTask),
    }

    /// Timers that only run when the test says so
    #[derive(Default)]
    struct ManualScheduler {
        timers: Mutex<Vec<(Arc<AtomicBool>, Pending)>>,
    }

    impl ManualScheduler {
        /// Run every live timer once, in scheduling order
        fn fire(&self) {
            let mut timers = self.timers.lock().unwrap();
            for (cancelled, pending) in timers.iter_mut() {
                if cancelled.load(Ordering::Acquire) {
                    continue;
                }
                match pending {
                    Pending::Once(task) => {
                        if let Some(task) = task.take() {
                            task();
                        }
                    }
                    Pending::Repeating(task) => task(),
                }
            }
            timers.retain(|(cancelled, pending)| {
                !cancelled.load(Ordering::Acquire) && !matches!(pending, Pending::Once(None))
            });
        }

        fn live(&self) -> usize {
            self.timers
                .lock()
                .unwrap()
                .iter()
                .filter(|(cancelled, _)| !cancelled.load(Ordering::Acquire))
                .count()
        }
    }

    impl Scheduler for ManualScheduler {
        fn schedule_once(&self, _delay: Duration, task: OnceTask) -> TimerHandle {
            let cancelled = Arc::new(AtomicBool::new(false));
            let mut timers = self.timers.lock().unwrap();
            timers.push((Arc::clone(&cancelled), Pending::Once(Some(task))));
            TimerHandle::new(timers.len() as u64, cancelled)
        }

        fn schedule_repeating(&self, _period: Duration, task: RepeatingTask) -> TimerHandle {
            let cancelled = Arc::new(AtomicBool::new(false));
            let mut timers = self.timers.lock().unwrap();
            timers.push((Arc::clone(&cancelled), Pending::Repeating(task)));
            TimerHandle::new(timers.len() as u64, cancelled)
        }
    }

    struct Harness {
        machine: PatrolMachine,
        rx: mpsc::UnboundedReceiver<PatrolEvent>,
        _tx: mpsc::UnboundedSender<PatrolEvent>,
        recorder: Arc<Recorder>,
        scheduler: Arc<ManualScheduler>,
        store: Arc<SavedLocations>,
    }

    impl Harness {
        fn new(waypoints: &[&str]) -> Self {
            let recorder = Arc::new(Recorder::default());
            let scheduler = Arc::new(ManualScheduler::default());
            let store = Arc::new(SavedLocations::new(waypoints.iter().copied()));
            let deps = Collaborators {
                waypoints: store.clone(),
                navigation: recorder.clone(),
                platform: recorder.clone(),
                capture: recorder.clone(),
                events: Arc::new(EventHub::new()),
                scheduler: scheduler.clone(),
            };
            let (tx, rx) = mpsc::unbounded_channel();
            let machine = PatrolMachine::new(
                RouteConfig::default(),
                SweepConfig::default(),
                &deps,
                tx.downgrade(),
            );
            Harness {
                machine,
                rx,
                _tx: tx,
                recorder,
                scheduler,
                store,
            }
        }

        /// Fire timers once and feed the resulting events to the machine
        fn tick(&mut self) {
            self.scheduler.fire();
            while let Ok(event) = self.rx.try_recv() {
                self.machine.handle(event);
            }
        }

        fn status(&mut self, location: &str, status: &str) {
            self.machine
                .handle(PatrolEvent::NavigationStatus(NavigationUpdate::new(
                    location, status, 0, "",
                )));
        }

        fn state(&self) -> PatrolState {
            self.machine.snapshot().state
        }
    }

    fn sweep_calls(turns: usize) -> Vec<Call> {
        (0..turns).flat_map(|_| [Call::Turn(45), Call::Capture]).collect()
    }

    #[test]
    fn start_goes_to_first_waypoint() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);

        let snapshot = h.machine.snapshot();
        assert!(snapshot.active);
        assert_eq!(snapshot.cursor, 0);
        assert_eq!(
            snapshot.state,
            PatrolState::NavigatingToWaypoint {
                target: "A".to_string()
            }
        );
        assert_eq!(h.recorder.take(), vec![Call::GoTo("A".to_string())]);
    }

    #[test]
    fn start_without_waypoints_stays_idle() {
        let mut h = Harness::new(&[]);
        h.machine.handle(PatrolEvent::Start);

        assert_eq!(h.state(), PatrolState::Idle);
        assert!(!h.machine.snapshot().active);
        assert!(h.recorder.take().is_empty());

        h.store.replace(["A"]);
        h.machine.handle(PatrolEvent::Start);
        assert_eq!(h.recorder.take(), vec![Call::GoTo("A".to_string())]);
    }

    #[test]
    fn second_start_while_active_is_ignored() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);
        h.machine.handle(PatrolEvent::Start);
        assert_eq!(h.recorder.take().len(), 1);
    }

    #[test]
    fn arrival_sweeps_eight_times_then_moves_on() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);
        h.recorder.take();

        h.status("A", "complete");
        assert!(matches!(h.state(), PatrolState::PerformingSweep { .. }));
        assert!(h.recorder.take().is_empty());

        // settle timer, then one tick per turn, then the finishing tick
        h.tick();
        for _ in 0..9 {
            h.tick();
        }

        let mut expected = sweep_calls(8);
        expected.push(Call::GoTo("B".to_string()));
        assert_eq!(h.recorder.take(), expected);
        assert_eq!(h.machine.snapshot().cursor, 1);
        assert_eq!(h.scheduler.live(), 0);
    }

    #[test]
    fn home_waypoint_skips_sweep() {
        let mut h = Harness::new(&["Home Base", "A"]);
        h.machine.handle(PatrolEvent::Start);
        h.recorder.take();

        h.status("home base", "COMPLETE");

        assert_eq!(h.recorder.take(), vec![Call::GoTo("A".to_string())]);
        assert_eq!(h.machine.snapshot().cursor, 1);
        assert_eq!(h.scheduler.live(), 0);
    }

    #[test]
    fn stop_mid_sweep_silences_pending_ticks() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);
        h.status("A", "complete");
        h.tick();
        h.tick();
        h.tick();
        h.recorder.take();

        // a tick already in the queue when stop arrives
        h.machine.handle(PatrolEvent::SweepTick {
            generation: h.machine.snapshot().generation,
        });
        h.recorder.take();
        let stale = h.machine.snapshot().generation;
        h.machine.handle(PatrolEvent::Stop);
        h.machine.handle(PatrolEvent::SweepTick { generation: stale });
        h.tick();

        assert!(h.recorder.take().is_empty());
        assert_eq!(h.state(), PatrolState::Idle);
        assert_eq!(h.scheduler.live(), 0);
    }

    #[test]
    fn abort_halts_until_restart() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);
        h.recorder.take();

        h.status("A", "abort");
        assert_eq!(h.state(), PatrolState::Aborted);
        assert!(!h.machine.snapshot().active);

        h.status("A", "complete");
        h.tick();
        assert!(h.recorder.take().is_empty());

        h.machine.handle(PatrolEvent::Start);
        assert_eq!(h.recorder.take(), vec![Call::GoTo("A".to_string())]);
        assert_eq!(h.machine.snapshot().cursor, 0);
    }

    #[test]
    fn non_terminal_and_unknown_statuses_change_nothing() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);
        let before = h.machine.snapshot();

        h.status("A", "going");
        h.status("A", "calculating");
        h.status("A", "teleported");

        assert_eq!(h.machine.snapshot(), before);
    }

    #[test]
    fn status_for_another_location_is_ignored() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);
        h.recorder.take();

        h.status("B", "complete");

        assert_eq!(
            h.state(),
            PatrolState::NavigatingToWaypoint {
                target: "A".to_string()
            }
        );
        assert_eq!(h.scheduler.live(), 0);
    }

    #[test]
    fn completion_during_sweep_does_not_restart_it() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);
        h.status("A", "complete");
        h.tick();
        h.tick();
        h.status("A", "complete");

        match h.state() {
            PatrolState::PerformingSweep { progress, .. } => assert_eq!(progress.turns_done(), 1),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn ready_hides_top_bar() {
        let mut h = Harness::new(&["A"]);
        h.machine.handle(PatrolEvent::RobotReady(false));
        h.machine.handle(PatrolEvent::RobotReady(true));
        assert_eq!(h.recorder.take(), vec![Call::HideTopBar]);
        assert_eq!(h.state(), PatrolState::Idle);
    }

    #[test]
    fn destroy_is_idempotent_and_blocks_restart() {
        let mut h = Harness::new(&["A", "B"]);
        h.machine.handle(PatrolEvent::Start);
        h.status("A", "complete");
        h.machine.handle(PatrolEvent::Destroy);
        h.machine.handle(PatrolEvent::Destroy);
        h.recorder.take();

        h.tick();
        h.machine.handle(PatrolEvent::Start);

        let snapshot = h.machine.snapshot();
        assert!(snapshot.destroyed);
        assert_eq!(snapshot.state, PatrolState::Idle);
        assert!(h.recorder.take().is_empty());
        assert_eq!(h.scheduler.live(), 0);
    }
}
