use gst::prelude::*;

use rtsp_loop::{GraphEvent, StreamStatusKind};

/// Describe a bus message in the supervisor's terms.
pub fn translate(message: &gst::MessageRef) -> GraphEvent {
    use gst::MessageView;

    match message.view() {
        MessageView::DurationChanged(_) => GraphEvent::DurationKnown,
        MessageView::SegmentDone(_) => GraphEvent::SegmentBoundaryReached,
        MessageView::StreamStatus(status) => {
            let (kind, owner) = status.get();
            match stream_status_kind(kind) {
                Some(kind) => GraphEvent::StreamStatus {
                    kind,
                    owner: owner.name().to_string(),
                },
                None => GraphEvent::Other(format!("{:?}", message.type_())),
            }
        }
        MessageView::Error(err) => GraphEvent::FatalError {
            source: message
                .src()
                .map(|src| src.path_string().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            message: err.error().to_string(),
            debug: err.debug().map(|d| d.to_string()),
        },
        MessageView::Eos(_) => GraphEvent::EndOfStream,
        MessageView::StateChanged(change) => GraphEvent::StateChanged {
            old: format!("{:?}", change.old()),
            new: format!("{:?}", change.current()),
            pending: format!("{:?}", change.pending()),
        },
        _ => GraphEvent::Other(format!("{:?}", message.type_())),
    }
}

fn stream_status_kind(kind: gst::StreamStatusType) -> Option<StreamStatusKind> {
    Some(match kind {
        gst::StreamStatusType::Create => StreamStatusKind::Create,
        gst::StreamStatusType::Enter => StreamStatusKind::Enter,
        gst::StreamStatusType::Leave => StreamStatusKind::Leave,
        gst::StreamStatusType::Destroy => StreamStatusKind::Destroy,
        gst::StreamStatusType::Start => StreamStatusKind::Start,
        gst::StreamStatusType::Pause => StreamStatusKind::Pause,
        gst::StreamStatusType::Stop => StreamStatusKind::Stop,
        _ => return None,
    })
}
