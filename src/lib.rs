pub mod behaviors;
pub mod capture;
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod perception;
pub mod platform;
pub mod scheduler;
pub mod sim;

use crate::behaviors::PatrolController;
use crate::capture::CapturePoller;
use crate::error::Result;
use crate::lifecycle::LifecycleNode;
use tracing::info;

pub use crate::error::PatrolError;

/// Core runtime for the patrol robot
#[derive(Default)]
pub struct PatrolCore {
    components: Vec<Box<dyn LifecycleNode>>,
}

impl PatrolCore {
    /// Create a new instance of PatrolCore
    pub fn new() -> Self {
        PatrolCore {
            components: Vec::new(),
        }
    }

    /// Register a component with the core
    pub fn register<T: LifecycleNode + 'static>(&mut self, component: T) {
        self.components.push(Box::new(component));
    }

    /// Configure then activate all registered components, in registration order
    pub fn init(&mut self) -> Result<()> {
        for component in &mut self.components {
            info!("Bringing up {}", component.name());
            component.on_configure()?;
            component.on_activate()?;
        }
        Ok(())
    }

    /// Deactivate then clean up all registered components, in reverse order
    pub fn shutdown(&mut self) -> Result<()> {
        for component in self.components.iter_mut().rev() {
            info!("Shutting down {}", component.name());
            component.on_deactivate()?;
            component.on_cleanup()?;
        }
        Ok(())
    }

    /// Find a registered component by type
    pub fn component_mut<T: LifecycleNode + 'static>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut::<T>())
    }

    /// Get a reference to the patrol controller
    pub fn patrol_controller_mut(&mut self) -> Option<&mut PatrolController> {
        self.component_mut::<PatrolController>()
    }

    /// Get a reference to the continuous capture poller
    pub fn capture_poller_mut(&mut self) -> Option<&mut CapturePoller> {
        self.component_mut::<CapturePoller>()
    }
}
