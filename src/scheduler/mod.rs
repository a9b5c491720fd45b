//! Delayed and repeating callbacks with cancellation
//!
//! Cancelling a handle stops future runs, but a callback that already queued
//! work elsewhere cannot be recalled. Consumers that need a hard guarantee pair
//! each schedule with a generation token and recheck it when the work arrives.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Timer scheduling used for sweep pacing and capture throttling
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TimerHandle;

    /// Run `task` immediately and then every `period` until cancelled
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerHandle;
}

/// Cancellation handle for a scheduled callback
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    /// Handle backed only by a cancellation flag the scheduler checks before each run
    pub fn new(id: u64, cancelled: Arc<AtomicBool>) -> Self {
        TimerHandle {
            id,
            cancelled,
            abort: None,
        }
    }

    fn with_task(id: u64, cancelled: Arc<AtomicBool>, abort: AbortHandle) -> Self {
        TimerHandle {
            id,
            cancelled,
            abort: Some(abort),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the timer. Calling this more than once is harmless.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Scheduler backed by tasks on a tokio runtime
pub struct TokioScheduler {
    runtime: Handle,
    next_id: AtomicU64,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        TokioScheduler {
            runtime,
            next_id: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::Acquire) {
                task();
            }
        });
        TimerHandle::with_task(self.next_id(), cancelled, join.abort_handle())
    }

    fn schedule_repeating(&self, period: Duration, mut task: RepeatingTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let join = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                task();
            }
        });
        TimerHandle::with_task(self.next_id(), cancelled, join.abort_handle())
    }
}
