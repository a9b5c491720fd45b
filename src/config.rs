//! Configuration loading for the patrol controller

use crate::error::{PatrolError, Result};
use crate::navigation::SpeedLevel;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PatrolConfig {
    #[serde(default)]
    pub patrol: RouteConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub head: HeadConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Route settings
#[derive(Clone, Debug, Deserialize)]
pub struct RouteConfig {
    /// Waypoint that is passed through without a sweep (default: "home base")
    #[serde(default = "default_home_waypoint")]
    pub home_waypoint: String,

    /// Speed level requested for every goTo (default: slow)
    #[serde(default)]
    pub speed_level: SpeedLevel,
}

/// Turn-and-capture sweep performed at each waypoint
#[derive(Clone, Debug, Deserialize)]
pub struct SweepConfig {
    /// Pause after arrival before the first turn, in milliseconds (default: 10000)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Interval between turns, in milliseconds (default: 1000)
    #[serde(default = "default_turn_interval")]
    pub turn_interval_ms: u64,

    /// Number of turn-and-capture actions per sweep (default: 8)
    #[serde(default = "default_turns")]
    pub turns: u32,

    /// Degrees turned per action (default: 45)
    #[serde(default = "default_turn_degrees")]
    pub turn_degrees: i32,

    /// Turn speed in [0, 1] (default: 1.0)
    #[serde(default = "default_turn_speed")]
    pub turn_speed: f32,
}

/// Continuous capture throttling
#[derive(Clone, Debug, Deserialize)]
pub struct CaptureConfig {
    /// Minimum time between captures, in milliseconds (default: 5000)
    #[serde(default = "default_min_capture_interval")]
    pub min_interval_ms: u64,

    /// Poll tick that checks whether a capture may be issued, in milliseconds (default: 500)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

/// Head tilt applied at start-up
#[derive(Clone, Debug, Deserialize)]
pub struct HeadConfig {
    #[serde(default = "default_tilt_degrees")]
    pub tilt_degrees: i32,

    #[serde(default = "default_tilt_speed")]
    pub tilt_speed: f32,
}

/// Simulated platform settings used by `patrol_node`
#[derive(Clone, Debug, Deserialize)]
pub struct SimulationConfig {
    /// Saved locations the simulated robot reports
    #[serde(default = "default_waypoints")]
    pub waypoints: Vec<String>,

    /// Simulated travel time per goTo, in milliseconds (default: 3000)
    #[serde(default = "default_travel_time")]
    pub travel_time_ms: u64,

    /// Locations the simulator reports an abort for instead of completing
    #[serde(default)]
    pub abort_at: Vec<String>,

    /// How long the node runs before shutting down, in seconds (default: 120)
    #[serde(default = "default_run_secs")]
    pub run_secs: u64,
}

impl SweepConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn turn_interval(&self) -> Duration {
        Duration::from_millis(self.turn_interval_ms)
    }
}

impl CaptureConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            home_waypoint: default_home_waypoint(),
            speed_level: SpeedLevel::default(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            turn_interval_ms: default_turn_interval(),
            turns: default_turns(),
            turn_degrees: default_turn_degrees(),
            turn_speed: default_turn_speed(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_capture_interval(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            tilt_degrees: default_tilt_degrees(),
            tilt_speed: default_tilt_speed(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            waypoints: default_waypoints(),
            travel_time_ms: default_travel_time(),
            abort_at: Vec::new(),
            run_secs: default_run_secs(),
        }
    }
}

// Default value functions
fn default_home_waypoint() -> String {
    "home base".to_string()
}
fn default_settle_delay() -> u64 {
    10_000
}
fn default_turn_interval() -> u64 {
    1_000
}
fn default_turns() -> u32 {
    8
}
fn default_turn_degrees() -> i32 {
    45
}
fn default_turn_speed() -> f32 {
    1.0
}
fn default_min_capture_interval() -> u64 {
    5_000
}
fn default_poll_interval() -> u64 {
    500
}
fn default_tilt_degrees() -> i32 {
    30
}
fn default_tilt_speed() -> f32 {
    0.5
}
fn default_waypoints() -> Vec<String> {
    vec!["A".to_string(), "B".to_string(), default_home_waypoint()]
}
fn default_travel_time() -> u64 {
    3_000
}
fn default_run_secs() -> u64 {
    120
}

impl PatrolConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PatrolError::Config(format!("Failed to read config file: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: PatrolConfig = toml::from_str(content)?;
        if config.sweep.turn_interval_ms == 0 {
            return Err(PatrolError::Config(
                "sweep.turn_interval_ms must be greater than zero".to_string(),
            ));
        }
        if config.capture.poll_interval_ms == 0 {
            return Err(PatrolError::Config(
                "capture.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}
