//! Photo capture seam and continuous-capture throttling
//!
//! Camera and upload live outside this crate. A `CaptureClient` reports
//! nothing back: failures are logged by the implementation and never reach
//! the patrol state machine.
mod poller;

pub use poller::CapturePoller;

use crate::scheduler::Scheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fire-and-forget photo capture
pub trait CaptureClient: Send + Sync {
    fn capture_photo(&self);
}

/// Reentrancy guard around a capture client.
///
/// The busy flag is set right before a capture is issued and cleared by a
/// delayed callback `min_interval` later. Captures requested while busy are
/// dropped.
pub struct CaptureLimiter {
    inner: Arc<dyn CaptureClient>,
    scheduler: Arc<dyn Scheduler>,
    min_interval: Duration,
    busy: Arc<AtomicBool>,
}

impl CaptureLimiter {
    pub fn new(
        inner: Arc<dyn CaptureClient>,
        scheduler: Arc<dyn Scheduler>,
        min_interval: Duration,
    ) -> Self {
        CaptureLimiter {
            inner,
            scheduler,
            min_interval,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Issue a capture unless one was issued less than `min_interval` ago.
    /// Returns whether the capture went out.
    pub fn try_capture(&self) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Capture skipped, previous capture still cooling down");
            return false;
        }

        self.inner.capture_photo();

        let busy = Arc::clone(&self.busy);
        self.scheduler.schedule_once(
            self.min_interval,
            Box::new(move || busy.store(false, Ordering::Release)),
        );
        true
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl CaptureClient for CaptureLimiter {
    fn capture_photo(&self) {
        self.try_capture();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[tokio::test(start_paused = true)]
    async fn second_capture_inside_interval_is_dropped() {
        let camera = Arc::new(CountingCamera::default());
        let scheduler = Arc::new(TokioScheduler::new(Handle::current()));
        let limiter = CaptureLimiter::new(camera.clone(), scheduler, Duration::from_secs(5));

        assert!(limiter.try_capture());
        assert!(limiter.is_busy());
        assert!(!limiter.try_capture());
        assert_eq!(camera.shots.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert!(!limiter.is_busy());
        assert!(limiter.try_capture());
        assert_eq!(camera.shots.load(Ordering::SeqCst), 2);
    }
}
