use std::sync::Arc;

use gst::glib;
use gst::prelude::*;

use rtsp_loop::{
    GraphDescription, LoopError, MediaToolkit, PlaybackUnit, Result, SeekRequest, SeekTarget,
    SessionSupervisor,
};

use crate::LoopBin;

/// Name of the supervised bin inside every container.
pub const UNIT_NAME: &str = "loop-unit";
/// Name of the top-level container handed to the RTSP layer.
pub const CONTAINER_NAME: &str = "loop-container";

/// Builds playback graphs with `gst::parse::launch` and wraps them as
/// `Pipeline(CONTAINER_NAME) > LoopBin(UNIT_NAME) > graph`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstToolkit;

impl MediaToolkit for GstToolkit {
    type Graph = gst::Element;
    type Container = gst::Pipeline;

    fn parse_graph(&self, description: &GraphDescription) -> Result<gst::Element> {
        gst::parse::launch(description.as_str()).map_err(|e| LoopError::GraphBuild {
            description: description.to_string(),
            reason: e.to_string(),
        })
    }

    fn assemble(
        &self,
        unit: PlaybackUnit<gst::Element>,
        supervisor: Arc<SessionSupervisor>,
    ) -> Result<gst::Pipeline> {
        let container = gst::Pipeline::with_name(CONTAINER_NAME);
        let bin = LoopBin::new(UNIT_NAME, supervisor);

        bin.add(&unit.into_graph()).map_err(toolkit_error)?;
        container.add(&bin).map_err(toolkit_error)?;

        Ok(container)
    }

    fn seek_target(&self, container: &gst::Pipeline) -> Box<dyn SeekTarget> {
        Box::new(ContainerSeek(container.downgrade()))
    }
}

fn toolkit_error(err: glib::BoolError) -> LoopError {
    LoopError::Toolkit(err.to_string())
}

/// Issues loop seeks on a container without keeping it alive.
pub struct ContainerSeek(glib::WeakRef<gst::Pipeline>);

impl SeekTarget for ContainerSeek {
    fn seek(&self, request: &SeekRequest) -> Result<()> {
        let container = self
            .0
            .upgrade()
            .ok_or_else(|| LoopError::Seek("container already released".to_string()))?;

        container
            .seek(
                request.rate,
                gst::SeekFlags::SEGMENT,
                gst::SeekType::Set,
                clock_time(request.start),
                gst::SeekType::Set,
                clock_time(request.stop),
            )
            .map_err(|e| LoopError::Seek(e.to_string()))
    }
}

/// Saturates at `ClockTime::MAX`; `u64::MAX` nanoseconds means "none".
fn clock_time(position: std::time::Duration) -> gst::ClockTime {
    u64::try_from(position.as_nanos())
        .ok()
        .filter(|ns| *ns <= gst::ClockTime::MAX.nseconds())
        .map_or(gst::ClockTime::MAX, gst::ClockTime::from_nseconds)
}
