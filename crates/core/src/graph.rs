//! Capabilities the core consumes from the external media toolkit.
//!
//! The session manager never touches decoding or RTP itself. It needs four
//! things from the toolkit, each expressed as a trait or plain value here:
//!
//! | Capability | Type |
//! |------------|------|
//! | Build a playback graph from a file path | [`MediaToolkit::parse_graph`] with a [`GraphDescription`] |
//! | Wrap it in a supervised top-level container | [`MediaToolkit::assemble`] |
//! | Receive lifecycle events from the graph | [`GraphEvent`], fed to [`SessionSupervisor::handle`](crate::SessionSupervisor::handle) |
//! | Seek the container | [`SeekTarget`] with a [`SeekRequest`] |
//!
//! Transport policy is pushed into the RTSP layer through
//! [`TransportSettings`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::supervisor::SessionSupervisor;
use crate::unit::PlaybackUnit;

/// RTP payload type used for the H.264 stream.
pub const PAYLOAD_TYPE: u8 = 96;

/// Textual graph description in the toolkit's pipe-delimited launch
/// grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDescription(String);

impl GraphDescription {
    /// File read → MP4 demux → H.264 parse → queue → RTP payloader.
    ///
    /// The payloader is named `pay0` so the RTSP layer can find it, and it
    /// repeats SPS/PPS with every keyframe interval (`config-interval=1`).
    pub fn for_file(path: &Path) -> Self {
        Self(format!(
            "filesrc location=\"{}\" ! qtdemux ! h264parse ! queue2 ! \
             rtph264pay name=pay0 config-interval=1 pt={PAYLOAD_TYPE}",
            escape_location(&path.to_string_lossy())
        ))
    }

    /// Use a launch line verbatim.
    pub fn from_launch(launch: impl Into<String>) -> Self {
        Self(launch.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GraphDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape_location(location: &str) -> String {
    let mut escaped = String::with_capacity(location.len());
    for c in location.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Kind of a streaming-thread status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatusKind {
    Create,
    Enter,
    Leave,
    Destroy,
    Start,
    Pause,
    Stop,
}

/// Lifecycle and status events observed on a playback graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// The graph learned (or re-learned) its duration; playback has begun.
    DurationKnown,
    /// Playback reached the stop position of the active segment seek.
    SegmentBoundaryReached,
    /// A streaming thread changed status.
    StreamStatus {
        kind: StreamStatusKind,
        owner: String,
    },
    /// A graph element failed; the container cannot continue.
    FatalError {
        source: String,
        message: String,
        debug: Option<String>,
    },
    /// Real end of stream. Segment seeks should keep this from happening.
    EndOfStream,
    StateChanged {
        old: String,
        new: String,
        pending: String,
    },
    /// Anything else, named by its message type.
    Other(String),
}

/// A non-flushing segment seek in time format.
///
/// Segment seeks bound playback to `[start, stop]` and post a
/// segment-done message at `stop` instead of EOS, so repeating one loops
/// the stream without a flush or keyframe renegotiation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    pub rate: f64,
    pub start: Duration,
    pub stop: Duration,
}

impl SeekRequest {
    /// Seek back to zero, playing until `loop_point`.
    pub fn loop_to(loop_point: Duration) -> Self {
        Self {
            rate: 1.0,
            start: Duration::ZERO,
            stop: loop_point,
        }
    }
}

/// The object seeks are issued on: the top-level container.
///
/// Implementations hold a non-owning reference. A seek after the container
/// is gone fails with [`LoopError::Seek`](crate::LoopError::Seek).
pub trait SeekTarget: Send + Sync {
    fn seek(&self, request: &SeekRequest) -> Result<()>;
}

/// The external media toolkit that builds and wraps playback graphs.
pub trait MediaToolkit: Send + Sync + 'static {
    /// An instantiated playback graph.
    type Graph: Send;
    /// The top-level container handed to the RTSP layer.
    type Container: Send;

    /// Instantiate a graph from its description.
    fn parse_graph(&self, description: &GraphDescription) -> Result<Self::Graph>;

    /// Put the unit's graph under a bin that routes every message through
    /// `supervisor`, and wrap that bin in a fresh top-level container.
    fn assemble(
        &self,
        unit: PlaybackUnit<Self::Graph>,
        supervisor: Arc<SessionSupervisor>,
    ) -> Result<Self::Container>;

    /// Non-owning seek handle for `container`.
    fn seek_target(&self, container: &Self::Container) -> Box<dyn SeekTarget>;
}

/// Per-media transport knobs exposed by the RTSP layer.
pub trait TransportSettings {
    fn set_shared(&self, shared: bool);
    fn set_retransmission(&self, enabled: bool);
    fn set_reliable_only(&self, reliable_only: bool);
    fn set_stop_on_disconnect(&self, stop: bool);
}
