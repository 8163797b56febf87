//! Looping file playback for RTSP mounts.
//!
//! Each configured endpoint is published as a mount. Every client request
//! on a mount builds its own playback graph, wraps it in a supervised
//! container, and keeps it looping with segment seeks. The media toolkit
//! and RTSP layer are plugged in through the traits in [`graph`] and
//! [`registrar`]; `rtsp-loop-gst` provides the GStreamer implementation.

pub mod config;
pub mod error;
pub mod factory;
pub mod graph;
pub mod probe;
pub mod registrar;
pub mod schedule;
pub mod source;
pub mod supervisor;
pub mod unit;

pub use config::{DebugLevel, ServerConfig, TransportPolicy};
pub use error::{LoopError, ProbeFailure, Result};
pub use factory::{Container, MountFactory};
pub use graph::{
    GraphDescription, GraphEvent, MediaToolkit, SeekRequest, SeekTarget, StreamStatusKind,
    TransportSettings,
};
pub use probe::{CachedProber, CommandProber, DurationProber};
pub use registrar::{MountPoints, Registrar};
pub use schedule::{ManualScheduler, Scheduler, TimerHandle};
pub use source::{MediaSource, SourceCatalog};
pub use supervisor::{SessionSupervisor, SupervisorState};
pub use unit::PlaybackUnit;
