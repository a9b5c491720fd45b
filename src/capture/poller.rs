//! Continuous capture while a patrol is running

use super::CaptureLimiter;
use crate::error::Result;
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::scheduler::{Scheduler, TimerHandle};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Polls the capture limiter on a short tick and captures whenever it is free.
///
/// The poll cadence is only a liveness check; the capture cadence is set by
/// the limiter's minimum interval.
pub struct CapturePoller {
    base: LifecycleNodeBase,
    limiter: Arc<CaptureLimiter>,
    scheduler: Arc<dyn Scheduler>,
    poll_interval: Duration,
    enabled: Arc<AtomicBool>,
    timer: Option<TimerHandle>,
}

impl CapturePoller {
    pub fn new(
        limiter: Arc<CaptureLimiter>,
        scheduler: Arc<dyn Scheduler>,
        poll_interval: Duration,
    ) -> Self {
        CapturePoller {
            base: LifecycleNodeBase::new("capture_poller"),
            limiter,
            scheduler,
            poll_interval,
            enabled: Arc::new(AtomicBool::new(false)),
            timer: None,
        }
    }

    /// Resume capturing on the next poll tick
    pub fn resume(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop capturing; the poll tick keeps running
    pub fn pause(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_capturing(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }
}

impl LifecycleNode for CapturePoller {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn on_configure(&mut self) -> Result<()> {
        if self.timer.is_none() {
            let limiter = Arc::clone(&self.limiter);
            let enabled = Arc::clone(&self.enabled);
            let handle = self.scheduler.schedule_repeating(
                self.poll_interval,
                Box::new(move || {
                    if enabled.load(Ordering::Acquire) && !limiter.is_busy() {
                        limiter.try_capture();
                    }
                }),
            );
            self.timer = Some(handle);
        }
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        info!("Continuous capture started");
        self.resume();
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        if self.is_capturing() {
            info!("Continuous capture paused");
        }
        self.pause();
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        self.pause();
        if let Some(timer) = self.timer.take() {
            debug!("Stopping capture poll timer {}", timer.id());
            timer.cancel();
        }
        self.base.set_state(State::Finalized);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureClient;
    use crate::scheduler::TokioScheduler;
    use std::sync::atomic::AtomicUsize;
    use tokio::runtime::Handle;

    #[derive(Default)]
    struct CountingCamera {
        shots: AtomicUsize,
    }

    impl CaptureClient for CountingCamera {
        fn capture_photo(&self) {
            self.shots.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn poller(camera: Arc<CountingCamera>) -> CapturePoller {
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new(Handle::current()));
        let limiter = Arc::new(CaptureLimiter::new(
            camera,
            Arc::clone(&scheduler),
            Duration::from_secs(5),
        ));
        CapturePoller::new(limiter, scheduler, Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn captures_are_throttled_to_limiter_interval() {
        let camera = Arc::new(CountingCamera::default());
        let mut poller = poller(Arc::clone(&camera));
        poller.on_configure().unwrap();
        poller.on_activate().unwrap();

        // polls every 500ms; captures at 0s, 5s, 10s
        tokio::time::sleep(Duration::from_millis(12_000)).await;
        assert_eq!(camera.shots.load(Ordering::SeqCst), 3);
        poller.on_cleanup().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn paused_poller_does_not_capture() {
        let camera = Arc::new(CountingCamera::default());
        let mut poller = poller(Arc::clone(&camera));
        poller.on_configure().unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(camera.shots.load(Ordering::SeqCst), 0);

        poller.on_activate().unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        poller.on_deactivate().unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(camera.shots.load(Ordering::SeqCst), 1);
        assert_eq!(poller.state(), State::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_stops_the_poll_timer() {
        let camera = Arc::new(CountingCamera::default());
        let mut poller = poller(Arc::clone(&camera));
        poller.on_configure().unwrap();
        poller.on_cleanup().unwrap();
        poller.resume();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(camera.shots.load(Ordering::SeqCst), 0);
        assert_eq!(poller.state(), State::Finalized);
    }
}
