//! Error types for the looping stream server.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while serving looping streams.
///
/// Variants map to the stage that failed:
///
/// - **Startup**: [`Config`](Self::Config), [`ListenerBind`](Self::ListenerBind),
///   [`Toolkit`](Self::Toolkit). Fatal, the process exits before listening.
/// - **Per client**: [`Probe`](Self::Probe), [`GraphBuild`](Self::GraphBuild),
///   [`UnknownEndpoint`](Self::UnknownEndpoint). Fail one connection attempt
///   and nothing else.
/// - **Per container**: [`FatalGraph`](Self::FatalGraph), [`Seek`](Self::Seek).
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid startup configuration (endpoint list, port, source bindings).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The duration probe failed for a media file.
    #[error("duration probe failed for {}: {kind}", path.display())]
    Probe { path: PathBuf, kind: ProbeFailure },

    /// The playback graph description could not be instantiated.
    #[error("failed to build playback graph `{description}`: {reason}")]
    GraphBuild { description: String, reason: String },

    /// No media source is bound to the requested endpoint.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// A running graph reported an unrecoverable error.
    #[error("fatal graph error from {source_name}: {message}")]
    FatalGraph {
        source_name: String,
        message: String,
    },

    /// The RTSP listener could not be attached to its address.
    #[error("failed to bind listener on {addr}: {reason}")]
    ListenerBind { addr: String, reason: String },

    /// The media toolkit failed outside of graph parsing (init, assembly).
    #[error("media toolkit error: {0}")]
    Toolkit(String),

    /// A seek was rejected, or its container no longer exists.
    #[error("seek failed: {0}")]
    Seek(String),
}

/// Specific kind of duration probe failure.
#[derive(Debug)]
pub enum ProbeFailure {
    /// The probe program could not be started.
    ToolUnavailable(String),
    /// The probe program exited with a non-zero status.
    ToolFailed { status: Option<i32>, stderr: String },
    /// The probe program printed nothing.
    EmptyOutput,
    /// The output was not a decimal number of seconds.
    Unparsable(String),
    /// The duration was zero, negative or not finite.
    NonPositive(f64),
    /// The duration is too large to represent.
    OutOfRange(f64),
    /// The probe program did not finish in time and was killed.
    TimedOut(Duration),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolUnavailable(tool) => write!(f, "could not run `{tool}`"),
            Self::ToolFailed {
                status: Some(code),
                stderr,
            } => write!(f, "tool exited with status {code}: {}", stderr.trim()),
            Self::ToolFailed { status: None, stderr } => {
                write!(f, "tool terminated by signal: {}", stderr.trim())
            }
            Self::EmptyOutput => write!(f, "empty output"),
            Self::Unparsable(text) => write!(f, "unparsable duration `{text}`"),
            Self::NonPositive(value) => write!(f, "duration must be positive, got {value}"),
            Self::OutOfRange(value) => write!(f, "duration {value}s is out of range"),
            Self::TimedOut(limit) => write!(f, "tool did not finish within {limit:?}"),
        }
    }
}

impl LoopError {
    /// Whether this error only affects a single client's session.
    ///
    /// Startup errors return `false`; callers servicing a request log
    /// these and keep the listener running.
    pub fn is_per_client(&self) -> bool {
        matches!(
            self,
            Self::Probe { .. }
                | Self::GraphBuild { .. }
                | Self::UnknownEndpoint(_)
                | Self::FatalGraph { .. }
                | Self::Seek(_)
        )
    }
}

/// Convenience alias for `Result<T, LoopError>`.
pub type Result<T> = std::result::Result<T, LoopError>;
