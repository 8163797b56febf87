//! `RTSPMediaFactory` that builds an isolated, looping container for every
//! client request on its mount.

mod imp;

use std::sync::Arc;

use gst::glib;
use gst_rtsp_server::subclass::prelude::*;

use rtsp_loop::MountFactory;

use crate::GstToolkit;

glib::wrapper! {
    pub struct LoopMediaFactory(ObjectSubclass<imp::LoopMediaFactory>)
        @extends gst_rtsp_server::RTSPMediaFactory;
}

impl LoopMediaFactory {
    pub fn new(mount: Arc<MountFactory<GstToolkit>>) -> Self {
        let factory: Self = glib::Object::new();
        factory.imp().attach(mount);
        factory
    }
}
