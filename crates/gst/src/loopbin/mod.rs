//! `gst::Bin` that shows every child message to a [`SessionSupervisor`]
//! before handling it the default way.

mod imp;

use std::sync::Arc;

use gst::glib;
use gst::subclass::prelude::*;

use rtsp_loop::SessionSupervisor;

glib::wrapper! {
    pub struct LoopBin(ObjectSubclass<imp::LoopBin>)
        @extends gst::Bin, gst::Element, gst::Object,
        @implements gst::ChildProxy;
}

impl LoopBin {
    pub fn new(name: &str, supervisor: Arc<SessionSupervisor>) -> Self {
        let bin: Self = glib::Object::builder().property("name", name).build();
        bin.imp().attach(supervisor);
        bin
    }

    pub fn supervisor(&self) -> Option<Arc<SessionSupervisor>> {
        self.imp().supervisor()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gst::prelude::*;
    use rtsp_loop::{ManualScheduler, SupervisorState};

    use super::*;

    fn supervised() -> (LoopBin, Arc<SessionSupervisor>, ManualScheduler) {
        gst::init().unwrap();
        let scheduler = ManualScheduler::new();
        let supervisor = SessionSupervisor::new(
            "test",
            Duration::from_secs(4),
            Duration::from_millis(25),
            Arc::new(scheduler.clone()),
        );
        let bin = LoopBin::new("loop-unit", supervisor.clone());
        (bin, supervisor, scheduler)
    }

    #[test]
    fn child_messages_reach_supervisor() {
        let (bin, supervisor, scheduler) = supervised();
        let child = gst::Bin::with_name("graph");
        bin.add(&child).unwrap();

        child
            .post_message(gst::message::DurationChanged::builder().src(&child).build())
            .unwrap();

        assert_eq!(supervisor.state(), SupervisorState::Running);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn exposes_its_supervisor() {
        let (bin, supervisor, _) = supervised();
        assert_eq!(bin.name().as_str(), "loop-unit");
        assert!(Arc::ptr_eq(&bin.supervisor().unwrap(), &supervisor));
    }

    #[test]
    fn dropping_bin_releases_supervisor() {
        let (bin, supervisor, _) = supervised();
        let weak = Arc::downgrade(&supervisor);
        drop(supervisor);
        assert!(weak.upgrade().is_some());
        drop(bin);
        assert!(weak.upgrade().is_none());
    }
}
