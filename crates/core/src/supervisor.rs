//! Loop/seek state machine for one client's playback container.
//!
//! A supervisor is attached to the bin that wraps a playback graph. Every
//! message the bin receives is shown to the supervisor first and then
//! forwarded to the bin's default handler, so the RTSP layer still sees
//! state changes and EOS itself.
//!
//! ## States
//!
//! ```text
//! Starting --DurationKnown--> Running --SegmentBoundaryReached--> Running (seek)
//!     |                          |
//!     +------FatalError----------+--> Stopping --shutdown--> Stopped
//!     +------shutdown------------+----------------------------^
//! ```
//!
//! `DurationKnown` in `Starting` schedules the first seek after a short
//! delay so the graph's timeline can settle. That seek turns playback into
//! a bounded segment `[0, loop_point]`; from then on each segment-done
//! message re-issues the same seek immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::LoopError;
use crate::graph::{GraphEvent, SeekRequest, SeekTarget, StreamStatusKind};
use crate::schedule::{Scheduler, TimerHandle};

/// Supervisor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Waiting for the graph to report its duration.
    Starting,
    /// Looping: segment boundaries trigger seeks.
    Running,
    /// A fatal error was reported; no further seeks.
    Stopping,
    /// Torn down with the client session.
    Stopped,
}

/// Watches one container's messages and keeps its playback looping.
pub struct SessionSupervisor {
    endpoint: String,
    loop_point: Duration,
    seek_delay: Duration,
    scheduler: Arc<dyn Scheduler>,
    target: OnceLock<Box<dyn SeekTarget>>,
    state: Mutex<SupervisorState>,
    pending_seek: Mutex<Option<TimerHandle>>,
    fatal: Mutex<Option<LoopError>>,
    seeks: AtomicU64,
    this: Weak<SessionSupervisor>,
}

impl SessionSupervisor {
    pub fn new(
        endpoint: &str,
        loop_point: Duration,
        seek_delay: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            endpoint: endpoint.to_string(),
            loop_point,
            seek_delay,
            scheduler,
            target: OnceLock::new(),
            state: Mutex::new(SupervisorState::Starting),
            pending_seek: Mutex::new(None),
            fatal: Mutex::new(None),
            seeks: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    /// Set the container that seeks are issued on. Only the first call
    /// takes effect.
    pub fn attach_target(&self, target: Box<dyn SeekTarget>) {
        if self.target.set(target).is_err() {
            tracing::warn!(endpoint = %self.endpoint, "seek target already attached");
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn loop_point(&self) -> Duration {
        self.loop_point
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.lock()
    }

    /// Seeks issued so far, the initial seek included.
    pub fn seeks(&self) -> u64 {
        self.seeks.load(Ordering::SeqCst)
    }

    /// Whether the delayed initial seek is still waiting to run.
    pub fn has_pending_seek(&self) -> bool {
        self.pending_seek.lock().is_some()
    }

    /// The fatal graph error that stopped this container, if any.
    pub fn fatal_error(&self) -> Option<String> {
        self.fatal.lock().as_ref().map(ToString::to_string)
    }

    /// Observe `event`, then call `forward` with it unconditionally.
    ///
    /// `forward` is the default message handling of the wrapped bin. It
    /// always runs, in this call, after the supervisor's own processing.
    pub fn handle(&self, event: &GraphEvent, forward: impl FnOnce()) {
        self.observe(event);
        forward();
    }

    fn observe(&self, event: &GraphEvent) {
        match event {
            GraphEvent::DurationKnown => self.on_duration_known(),
            GraphEvent::SegmentBoundaryReached => self.on_segment_done(),
            GraphEvent::StreamStatus { kind, owner } => {
                tracing::debug!(endpoint = %self.endpoint, ?kind, owner = %owner, "stream status");
                match kind {
                    StreamStatusKind::Leave => {
                        tracing::debug!(endpoint = %self.endpoint, owner = %owner, "streaming thread leaving");
                    }
                    StreamStatusKind::Destroy => {
                        tracing::debug!(endpoint = %self.endpoint, owner = %owner, "streaming thread destroyed");
                        self.cancel_pending_seek();
                    }
                    _ => {}
                }
            }
            GraphEvent::FatalError {
                source,
                message,
                debug: detail,
            } => {
                tracing::error!(
                    endpoint = %self.endpoint,
                    source = %source,
                    message = %message,
                    debug = detail.as_deref().unwrap_or(""),
                    "playback graph failed"
                );
                *self.fatal.lock() = Some(LoopError::FatalGraph {
                    source_name: source.clone(),
                    message: message.clone(),
                });
                self.cancel_pending_seek();
                if self.state() != SupervisorState::Stopped {
                    self.transition(SupervisorState::Stopping);
                }
            }
            GraphEvent::EndOfStream => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    loop_point = self.loop_point.as_secs_f64(),
                    "end of stream reached, loop point undershot the media"
                );
            }
            GraphEvent::StateChanged { old, new, pending } => {
                tracing::debug!(endpoint = %self.endpoint, %old, %new, %pending, "state changed");
            }
            GraphEvent::Other(kind) => {
                tracing::debug!(endpoint = %self.endpoint, %kind, "graph message");
            }
        }
    }

    fn on_duration_known(&self) {
        let mut state = self.state.lock();
        if *state != SupervisorState::Starting {
            tracing::debug!(endpoint = %self.endpoint, state = ?*state, "duration changed");
            return;
        }

        tracing::info!(
            endpoint = %self.endpoint,
            delay = ?self.seek_delay,
            "duration known, scheduling initial seek"
        );

        // Held until the handle is stored: a task firing on another thread
        // waits here instead of finding the slot empty.
        let mut pending = self.pending_seek.lock();
        let this = self.this.clone();
        let handle = self.scheduler.schedule_once(
            self.seek_delay,
            Box::new(move || {
                if let Some(supervisor) = this.upgrade() {
                    let _ = supervisor.pending_seek.lock().take();
                    supervisor.seek_to_start();
                }
            }),
        );
        *pending = Some(handle);
        drop(pending);

        tracing::debug!(endpoint = %self.endpoint, old_state = ?*state, new_state = ?SupervisorState::Running, "state transition");
        *state = SupervisorState::Running;
    }

    fn on_segment_done(&self) {
        if self.state() == SupervisorState::Running {
            self.seek_to_start();
        } else {
            tracing::debug!(endpoint = %self.endpoint, state = ?self.state(), "segment done ignored");
        }
    }

    /// Issue the loop seek on the container, if still running.
    fn seek_to_start(&self) {
        if self.state() != SupervisorState::Running {
            return;
        }
        let Some(target) = self.target.get() else {
            tracing::warn!(endpoint = %self.endpoint, "no seek target attached");
            return;
        };

        let request = SeekRequest::loop_to(self.loop_point);
        tracing::info!(
            endpoint = %self.endpoint,
            stop = self.loop_point.as_secs_f64(),
            "seeking to start"
        );
        match target.seek(&request) {
            Ok(()) => {
                self.seeks.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => tracing::warn!(endpoint = %self.endpoint, error = %e, "loop seek failed"),
        }
    }

    /// Release everything tied to the client session.
    ///
    /// Cancels the pending initial seek and moves to `Stopped`. Safe to
    /// call more than once.
    pub fn shutdown(&self) {
        self.cancel_pending_seek();
        let current = self.state();
        if current == SupervisorState::Stopped {
            return;
        }
        if current != SupervisorState::Stopping {
            self.transition(SupervisorState::Stopping);
        }
        self.transition(SupervisorState::Stopped);
        tracing::info!(endpoint = %self.endpoint, seeks = self.seeks(), "session released");
    }

    fn cancel_pending_seek(&self) {
        let pending = self.pending_seek.lock().take();
        if let Some(handle) = pending {
            handle.cancel();
            tracing::debug!(endpoint = %self.endpoint, "pending seek cancelled");
        }
    }

    fn transition(&self, new_state: SupervisorState) {
        let mut state = self.state.lock();
        tracing::debug!(endpoint = %self.endpoint, old_state = ?*state, new_state = ?new_state, "state transition");
        *state = new_state;
    }
}

impl Drop for SessionSupervisor {
    fn drop(&mut self) {
        if let Some(handle) = self.pending_seek.get_mut().take() {
            handle.cancel();
        }
    }
}
