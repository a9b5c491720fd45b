//! Per-event listener registration
//!
//! Each event source is a separate registration list, so a component subscribes
//! only to what it consumes and removes each subscription by id.

use crate::navigation::NavigationUpdate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by every registration
pub type ListenerId = u64;

pub type ReadyListener = Box<dyn Fn(bool) + Send + Sync>;
pub type NavigationListener = Box<dyn Fn(&NavigationUpdate) + Send + Sync>;
pub type PositionListener = Box<dyn Fn(f32, f32) + Send + Sync>;

/// Event sources exposed by the robot platform
pub trait RobotEvents: Send + Sync {
    fn add_robot_ready_listener(&self, listener: ReadyListener) -> ListenerId;

    fn add_navigation_status_listener(&self, listener: NavigationListener) -> ListenerId;

    fn add_position_listener(&self, listener: PositionListener) -> ListenerId;

    /// Remove a listener from whichever list holds it. Returns false if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Number of live registrations across all lists
    fn listener_count(&self) -> usize;
}

type Registry<F> = Mutex<Vec<(ListenerId, Arc<F>)>>;

/// In-process event fan-out used by platform adapters and the simulator
#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    ready: Registry<dyn Fn(bool) + Send + Sync>,
    navigation: Registry<dyn Fn(&NavigationUpdate) + Send + Sync>,
    position: Registry<dyn Fn(f32, f32) + Send + Sync>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn register<F: ?Sized>(&self, registry: &Registry<F>, listener: Arc<F>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut guard) = registry.lock() {
            guard.push((id, listener));
        }
        id
    }

    // Listeners run outside the lock so they may register or remove others.
    fn snapshot<F: ?Sized>(registry: &Registry<F>) -> Vec<Arc<F>> {
        registry
            .lock()
            .map(|guard| guard.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    fn remove_from<F: ?Sized>(registry: &Registry<F>, id: ListenerId) -> bool {
        match registry.lock() {
            Ok(mut guard) => {
                let before = guard.len();
                guard.retain(|(lid, _)| *lid != id);
                guard.len() != before
            }
            Err(_) => false,
        }
    }

    fn len<F: ?Sized>(registry: &Registry<F>) -> usize {
        registry.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn emit_robot_ready(&self, ready: bool) {
        for listener in Self::snapshot(&self.ready) {
            listener(ready);
        }
    }

    pub fn emit_navigation_status(&self, update: &NavigationUpdate) {
        for listener in Self::snapshot(&self.navigation) {
            listener(update);
        }
    }

    pub fn emit_position(&self, x: f32, y: f32) {
        for listener in Self::snapshot(&self.position) {
            listener(x, y);
        }
    }
}

impl RobotEvents for EventHub {
    fn add_robot_ready_listener(&self, listener: ReadyListener) -> ListenerId {
        self.register(&self.ready, Arc::from(listener))
    }

    fn add_navigation_status_listener(&self, listener: NavigationListener) -> ListenerId {
        self.register(&self.navigation, Arc::from(listener))
    }

    fn add_position_listener(&self, listener: PositionListener) -> ListenerId {
        self.register(&self.position, Arc::from(listener))
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        Self::remove_from(&self.ready, id)
            || Self::remove_from(&self.navigation, id)
            || Self::remove_from(&self.position, id)
    }

    fn listener_count(&self) -> usize {
        Self::len(&self.ready) + Self::len(&self.navigation) + Self::len(&self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn events_reach_only_their_own_listeners() {
        let hub = EventHub::new();
        let ready_calls = Arc::new(AtomicUsize::new(0));
        let position_calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ready_calls);
        hub.add_robot_ready_listener(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = Arc::clone(&position_calls);
        hub.add_position_listener(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        hub.emit_robot_ready(true);
        hub.emit_robot_ready(false);
        hub.emit_navigation_status(&NavigationUpdate::new("A", "complete", 1, ""));

        assert_eq!(ready_calls.load(Ordering::SeqCst), 2);
        assert_eq!(position_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removed_listener_no_longer_fires() {
        let hub = EventHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = hub.add_navigation_status_listener(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hub.listener_count(), 1);

        assert!(hub.remove_listener(id));
        assert!(!hub.remove_listener(id));
        hub.emit_navigation_status(&NavigationUpdate::new("A", "complete", 1, ""));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(hub.listener_count(), 0);
    }
}
