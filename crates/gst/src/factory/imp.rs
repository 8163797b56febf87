use std::sync::{Arc, OnceLock};

use gst::glib;
use gst::prelude::*;
use gst_rtsp_server::prelude::*;
use gst_rtsp_server::subclass::prelude::*;

use rtsp_loop::{MountFactory, TransportSettings};

use crate::{CAT, GstToolkit, LoopBin, UNIT_NAME};

#[derive(Default)]
pub struct LoopMediaFactory {
    mount: OnceLock<Arc<MountFactory<GstToolkit>>>,
}

impl LoopMediaFactory {
    pub(super) fn attach(&self, mount: Arc<MountFactory<GstToolkit>>) {
        if self.mount.set(mount).is_err() {
            gst::warning!(CAT, imp = self, "mount already attached");
        }
    }
}

#[glib::object_subclass]
impl ObjectSubclass for LoopMediaFactory {
    const NAME: &'static str = "GstRtspLoopMediaFactory";
    type Type = super::LoopMediaFactory;
    type ParentType = gst_rtsp_server::RTSPMediaFactory;
}

impl ObjectImpl for LoopMediaFactory {}

impl RTSPMediaFactoryImpl for LoopMediaFactory {
    fn create_element(&self, url: &gst_rtsp::RTSPUrl) -> Option<gst::Element> {
        let Some(mount) = self.mount.get() else {
            gst::error!(CAT, imp = self, "no mount attached");
            return None;
        };

        let request_uri = url.request_uri();
        match mount.create_for_request(request_uri.as_str()) {
            Ok(container) => Some(container.into_handle().upcast()),
            Err(e) => {
                gst::error!(CAT, imp = self, "failed to build media: {}", e);
                tracing::error!(
                    endpoint = mount.endpoint(),
                    request_uri = %request_uri,
                    error = %e,
                    "stream request failed"
                );
                None
            }
        }
    }

    fn configure(&self, media: &gst_rtsp_server::RTSPMedia) {
        self.parent_configure(media);

        let Some(mount) = self.mount.get() else {
            return;
        };
        mount.configure(&MediaTransport(media));
        release_on_unprepare(media);
    }
}

/// Stop the container's supervisor when the media is unprepared, which is
/// when its last client goes away.
fn release_on_unprepare(media: &gst_rtsp_server::RTSPMedia) {
    let unit = media
        .element()
        .downcast::<gst::Bin>()
        .ok()
        .and_then(|container| container.by_name(UNIT_NAME))
        .and_then(|unit| unit.downcast::<LoopBin>().ok());
    let Some(supervisor) = unit.and_then(|unit| unit.supervisor()) else {
        tracing::warn!("media has no supervised unit");
        return;
    };

    let supervisor = Arc::downgrade(&supervisor);
    media.connect_unprepared(move |_| {
        if let Some(supervisor) = supervisor.upgrade() {
            supervisor.shutdown();
        }
    });
}

struct MediaTransport<'a>(&'a gst_rtsp_server::RTSPMedia);

impl TransportSettings for MediaTransport<'_> {
    fn set_shared(&self, shared: bool) {
        self.0.set_shared(shared);
    }

    fn set_retransmission(&self, enabled: bool) {
        self.0.set_do_retransmission(enabled);
    }

    fn set_reliable_only(&self, reliable_only: bool) {
        if reliable_only {
            self.0.set_protocols(gst_rtsp::RTSPLowerTrans::TCP);
        }
    }

    fn set_stop_on_disconnect(&self, stop: bool) {
        self.0.set_stop_on_disconnect(stop);
    }
}
