//! Patrol node
//!
//! Runs the patrol loop against the simulated platform. Pass a TOML config
//! path as the first argument, or put `patrol.toml` in the working directory.

use anyhow::{Error, Result};
use patrol_core::behaviors::{Collaborators, PatrolController};
use patrol_core::capture::{CaptureLimiter, CapturePoller};
use patrol_core::config::PatrolConfig;
use patrol_core::platform::EventHub;
use patrol_core::scheduler::{Scheduler, TokioScheduler};
use patrol_core::sim::{SimulatedCamera, SimulatedRobot};
use patrol_core::PatrolCore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

fn load_config() -> Result<PatrolConfig> {
    let args: Vec<String> = std::env::args().collect();
    let config = if let Some(path) = args.get(1) {
        info!("Loading configuration from {}", path);
        PatrolConfig::load(Path::new(path))?
    } else if Path::new("patrol.toml").exists() {
        info!("Loading configuration from patrol.toml");
        PatrolConfig::load(Path::new("patrol.toml"))?
    } else {
        info!("Using default configuration");
        PatrolConfig::default()
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("patrol_core=info".parse()?),
        )
        .init();

    let config = load_config()?;
    info!("Patrol node v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Waypoints: {:?}, home: {}, sweep: {} x {} degrees",
        config.simulation.waypoints,
        config.patrol.home_waypoint,
        config.sweep.turns,
        config.sweep.turn_degrees
    );

    let hub = Arc::new(EventHub::new());
    let robot = Arc::new(SimulatedRobot::new(
        &config.simulation,
        Arc::clone(&hub),
        Handle::current(),
    ));
    let camera = Arc::new(SimulatedCamera::failing_every(7));
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new(Handle::current()));

    let controller = PatrolController::new(
        &config,
        Collaborators {
            waypoints: robot.clone(),
            navigation: robot.clone(),
            platform: robot.clone(),
            capture: camera.clone(),
            events: hub.clone(),
            scheduler: Arc::clone(&scheduler),
        },
    );
    controller.tilt_head(config.head.tilt_degrees, config.head.tilt_speed);

    let limiter = Arc::new(CaptureLimiter::new(
        camera.clone(),
        Arc::clone(&scheduler),
        config.capture.min_interval(),
    ));
    let poller = CapturePoller::new(limiter, scheduler, config.capture.poll_interval());

    let mut core = PatrolCore::new();
    core.register(controller);
    core.register(poller);
    core.init()?;
    robot.power_on();

    info!(
        "Patrol node running for {}s, press Ctrl-C to stop",
        config.simulation.run_secs
    );
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = tokio::time::sleep(Duration::from_secs(config.simulation.run_secs)) => {
            info!("Run time elapsed")
        }
    }

    if let Some(patrol) = core.patrol_controller_mut().filter(|p| p.is_running()) {
        let snapshot = patrol.snapshot().await?;
        info!(
            "Final state: {:?} (target {:?}), cursor {}, generation {}",
            snapshot.state,
            snapshot.state.target(),
            snapshot.cursor,
            snapshot.generation
        );
        if let Some(position) = patrol.position() {
            info!(
                "Last position: ({:.2}, {:.2}), travelled {:.2}m",
                position.x(),
                position.y(),
                position.travelled
            );
        }
    }

    core.shutdown()?;
    info!(
        "Captured {} photos ({} failed), heading {} degrees, tilt {} degrees, top bar hidden {} times",
        camera.shots(),
        camera.failures(),
        robot.heading_degrees(),
        robot.tilt_degrees(),
        robot.top_bar_hidden_count()
    );
    Ok(())
}
