//! Robot platform seams: event listener registration and non-navigation calls
pub mod events;

pub use events::{
    EventHub, ListenerId, NavigationListener, PositionListener, ReadyListener, RobotEvents,
};

/// Platform calls that are neither navigation nor capture
pub trait PlatformClient: Send + Sync {
    /// Tilt the head to an absolute angle. Callers validate the range first.
    fn tilt_angle(&self, degrees: i32, speed: f32);

    /// Hide the platform's status overlay (top bar)
    fn hide_top_bar(&self);
}
