//! Error types for the patrol controller

use thiserror::Error;

/// Patrol error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatrolError {
    #[error("No saved waypoints are configured")]
    EmptyStore,

    #[error("Navigation to {location} aborted")]
    NavigationAbort { location: String },

    #[error("Invalid head tilt: {degrees} degrees at speed {speed} (allowed -25..=55 degrees, speed 0..=1)")]
    InvalidTilt { degrees: i32, speed: f32 },

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Patrol controller is no longer running")]
    ControllerStopped,
}

impl From<toml::de::Error> for PatrolError {
    fn from(e: toml::de::Error) -> Self {
        PatrolError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PatrolError>;
