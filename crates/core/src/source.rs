use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Endpoint → media file bindings.
///
/// Endpoints with an explicit binding use it; every other endpoint maps to
/// `<media_dir>/<endpoint>.mp4`.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    media_dir: PathBuf,
    bindings: BTreeMap<String, PathBuf>,
}

impl SourceCatalog {
    pub fn new(media_dir: impl Into<PathBuf>, bindings: BTreeMap<String, PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
            bindings,
        }
    }

    /// Media file for an endpoint name (no leading `/`).
    pub fn path_for(&self, endpoint: &str) -> PathBuf {
        match self.bindings.get(endpoint) {
            Some(path) => path.clone(),
            None => self.media_dir.join(format!("{endpoint}.mp4")),
        }
    }

    /// Endpoint names that have an explicit binding.
    pub fn bound_endpoints(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }
}

/// A media file together with its probed duration.
///
/// The duration is always positive; [`crate::probe`] rejects anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub endpoint: String,
    pub path: PathBuf,
    pub duration: Duration,
}

impl MediaSource {
    /// Point at which playback is sent back to the start.
    ///
    /// The margin keeps the seek stop short of the real end of stream, so
    /// the transport never waits on data after EOS. A clip no longer than
    /// the margin loops over its full length instead.
    pub fn loop_point(&self, margin: Duration) -> Duration {
        if self.duration > margin {
            self.duration - margin
        } else {
            tracing::warn!(
                endpoint = %self.endpoint,
                duration = self.duration.as_secs_f64(),
                margin = margin.as_secs_f64(),
                "media shorter than loop margin, looping over full duration"
            );
            self.duration
        }
    }
}
