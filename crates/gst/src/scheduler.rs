use std::time::Duration;

use gst::glib;

use rtsp_loop::schedule::Task;
use rtsp_loop::{Scheduler, TimerHandle};

/// One-shot timers dispatched by a GLib main context.
///
/// Tasks run on whichever thread iterates the context, which for the
/// server is the thread running its main loop.
#[derive(Debug, Clone)]
pub struct MainContextScheduler {
    context: glib::MainContext,
}

impl MainContextScheduler {
    pub fn new(context: glib::MainContext) -> Self {
        Self { context }
    }
}

impl Default for MainContextScheduler {
    fn default() -> Self {
        Self::new(glib::MainContext::default())
    }
}

impl Scheduler for MainContextScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle {
        let mut task = Some(task);
        let source = glib::timeout_source_new(
            delay,
            Some("rtsp-loop-seek"),
            glib::Priority::DEFAULT,
            move || {
                if let Some(task) = task.take() {
                    task();
                }
                glib::ControlFlow::Break
            },
        );
        source.attach(Some(&self.context));

        TimerHandle::new(move || {
            if !source.is_destroyed() {
                source.destroy();
            }
        })
    }
}
