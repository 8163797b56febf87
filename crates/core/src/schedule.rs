//! One-shot timers on the server's event loop.
//!
//! The supervisor delays its first seek until the playback graph has had
//! time to settle. That delay is expressed through [`Scheduler`] so the
//! state machine does not depend on a particular main loop:
//!
//! - The GStreamer backend attaches GLib timeout sources to the main
//!   context that also drives the RTSP listener.
//! - [`ManualScheduler`] keeps a virtual clock that only moves when
//!   [`advance`](ManualScheduler::advance) is called. Tasks run on the
//!   caller's thread in deadline order, which makes timing behavior
//!   deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Schedules one-shot tasks.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`. Dropping the returned handle does not
    /// cancel the task; call [`TimerHandle::cancel`].
    ///
    /// The task may run on another thread, but never on the calling thread
    /// before this returns.
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Cancels a scheduled task that has not run yet.
#[must_use = "dropping a TimerHandle leaves the task scheduled"]
pub struct TimerHandle {
    release: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Cancel the task. Has no effect if it already ran.
    pub fn cancel(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.release.is_some())
            .finish()
    }
}

/// Virtual-time scheduler for embedding and tests.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    /// Keyed by (deadline, insertion order) so equal deadlines run FIFO.
    pending: BTreeMap<(Duration, u64), Task>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Number of tasks still waiting to run.
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Move the clock forward by `by`, running every task that falls due.
    ///
    /// Tasks scheduled by a running task are honored if their deadline is
    /// still inside the window. Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.inner.lock().now + by;
        let mut ran = 0;
        loop {
            let task = {
                let mut state = self.inner.lock();
                let due = state
                    .pending
                    .first_key_value()
                    .map(|(key, _)| *key)
                    .filter(|(deadline, _)| *deadline <= target);
                match due {
                    Some(key) => {
                        state.now = key.0;
                        state.pending.remove(&key)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };
            // Lock released before running so tasks can schedule more work.
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle {
        let key = {
            let mut state = self.inner.lock();
            let key = (state.now + delay, state.next_id);
            state.next_id += 1;
            state.pending.insert(key, task);
            key
        };
        tracing::trace!(deadline = ?key.0, "timer scheduled");

        let inner = Arc::clone(&self.inner);
        TimerHandle::new(move || {
            inner.lock().pending.remove(&key);
        })
    }
}
