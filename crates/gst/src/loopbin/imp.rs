use std::sync::{Arc, OnceLock};

use gst::glib;
use gst::subclass::prelude::*;

use rtsp_loop::SessionSupervisor;

use crate::CAT;
use crate::message::translate;

#[derive(Default)]
pub struct LoopBin {
    supervisor: OnceLock<Arc<SessionSupervisor>>,
}

impl LoopBin {
    pub(super) fn attach(&self, supervisor: Arc<SessionSupervisor>) {
        let endpoint = supervisor.endpoint().to_string();
        if self.supervisor.set(supervisor).is_err() {
            gst::warning!(CAT, imp = self, "supervisor already attached");
            return;
        }
        gst::debug!(CAT, imp = self, "supervising /{}", endpoint);
    }

    pub(super) fn supervisor(&self) -> Option<Arc<SessionSupervisor>> {
        self.supervisor.get().cloned()
    }
}

#[glib::object_subclass]
impl ObjectSubclass for LoopBin {
    const NAME: &'static str = "GstRtspLoopBin";
    type Type = super::LoopBin;
    type ParentType = gst::Bin;
}

impl ObjectImpl for LoopBin {}

impl GstObjectImpl for LoopBin {}

impl ElementImpl for LoopBin {}

impl BinImpl for LoopBin {
    fn handle_message(&self, message: gst::Message) {
        let Some(supervisor) = self.supervisor.get() else {
            self.parent_handle_message(message);
            return;
        };

        let event = translate(&message);
        gst::trace!(CAT, imp = self, "{:?}", event);
        supervisor.handle(&event, || self.parent_handle_message(message));
    }
}
