//! Media duration probing.
//!
//! The prober runs an external inspection tool (ffprobe by default) and
//! reads a single decimal seconds value from its standard output. Probing
//! blocks the calling thread, so it only happens while a playback unit is
//! being constructed, never from a thread that services running playback.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use parking_lot::Mutex;
use wait_timeout::ChildExt;

use crate::config::DEFAULT_PROBE_TIMEOUT;
use crate::error::{LoopError, ProbeFailure, Result};

/// ffprobe arguments that print only the container duration, e.g. `5.034000`.
const FFPROBE_ARGS: [&str; 6] = [
    "-v",
    "error",
    "-show_entries",
    "format=duration",
    "-of",
    "default=noprint_wrappers=1:nokey=1",
];

/// Source of media durations.
pub trait DurationProber: Send + Sync {
    /// Total duration of the media file at `path`. Always positive.
    fn probe(&self, path: &Path) -> Result<Duration>;
}

/// Runs a program with the media path as its last argument and parses the
/// duration from stdout.
///
/// A run that outlives the timeout is killed and reported as
/// [`ProbeFailure::TimedOut`]. Output is collected after the program
/// exits, so it must fit in the pipe buffers.
#[derive(Debug, Clone)]
pub struct CommandProber {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl CommandProber {
    /// Run `program` with `args` followed by the media path.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Probe with ffprobe (or a compatible binary at `program`).
    pub fn ffprobe(program: impl Into<PathBuf>) -> Self {
        Self::new(program, FFPROBE_ARGS)
    }

    /// Kill the program if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl DurationProber for CommandProber {
    fn probe(&self, path: &Path) -> Result<Duration> {
        let failure = |kind: ProbeFailure| LoopError::Probe {
            path: path.to_path_buf(),
            kind,
        };
        let wait_failed = |e: std::io::Error| {
            failure(ProbeFailure::ToolFailed {
                status: None,
                stderr: e.to_string(),
            })
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                tracing::debug!(program = %self.program.display(), error = %e, "probe spawn failed");
                failure(ProbeFailure::ToolUnavailable(self.program.display().to_string()))
            })?;

        let Some(status) = child.wait_timeout(self.timeout).map_err(wait_failed)? else {
            // Reap the killed child.
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(
                program = %self.program.display(),
                path = %path.display(),
                timeout = ?self.timeout,
                "probe timed out"
            );
            return Err(failure(ProbeFailure::TimedOut(self.timeout)));
        };

        let (stdout, stderr) = collect_output(&mut child).map_err(wait_failed)?;
        if !status.success() {
            return Err(failure(ProbeFailure::ToolFailed {
                status: status.code(),
                stderr,
            }));
        }

        let duration = parse_duration(&stdout).map_err(failure)?;
        tracing::debug!(path = %path.display(), seconds = duration.as_secs_f64(), "probed duration");
        Ok(duration)
    }
}

fn collect_output(child: &mut Child) -> std::io::Result<(String, String)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_end(&mut stdout)?;
    }
    if let Some(mut pipe) = child.stderr.take() {
        pipe.read_to_end(&mut stderr)?;
    }
    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

/// Parse probe output as a positive number of seconds.
///
/// Values that round to zero nanoseconds are rejected like zero itself;
/// values beyond what a `Duration` holds are [`ProbeFailure::OutOfRange`].
pub fn parse_duration(stdout: &str) -> std::result::Result<Duration, ProbeFailure> {
    let text = stdout.trim();
    if text.is_empty() {
        return Err(ProbeFailure::EmptyOutput);
    }
    let seconds: f64 = text
        .parse()
        .map_err(|_| ProbeFailure::Unparsable(text.to_string()))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ProbeFailure::NonPositive(seconds));
    }
    let duration =
        Duration::try_from_secs_f64(seconds).map_err(|_| ProbeFailure::OutOfRange(seconds))?;
    if duration.is_zero() {
        return Err(ProbeFailure::NonPositive(seconds));
    }
    Ok(duration)
}

/// Memoizes successful probes per path. Failures are not cached, so a file
/// that appears later is picked up by the next request.
pub struct CachedProber<P> {
    inner: P,
    durations: Mutex<HashMap<PathBuf, Duration>>,
}

impl<P: DurationProber> CachedProber<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            durations: Mutex::new(HashMap::new()),
        }
    }
}

impl<P: DurationProber> DurationProber for CachedProber<P> {
    fn probe(&self, path: &Path) -> Result<Duration> {
        if let Some(duration) = self.durations.lock().get(path) {
            return Ok(*duration);
        }
        // Not held across the probe: a slow tool must not block other paths.
        let duration = self.inner.probe(path)?;
        self.durations.lock().insert(path.to_path_buf(), duration);
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn parses_ffprobe_output() {
        assert_eq!(parse_duration("5.000000\n").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("  12.5 ").unwrap(), Duration::from_millis(12_500));
    }

    #[test]
    fn rejects_bad_output() {
        assert!(matches!(parse_duration(""), Err(ProbeFailure::EmptyOutput)));
        assert!(matches!(parse_duration("N/A"), Err(ProbeFailure::Unparsable(_))));
        assert!(matches!(parse_duration("0.0"), Err(ProbeFailure::NonPositive(_))));
        assert!(matches!(parse_duration("-3"), Err(ProbeFailure::NonPositive(_))));
        assert!(matches!(parse_duration("inf"), Err(ProbeFailure::NonPositive(_))));
    }

    #[test]
    fn huge_duration_is_out_of_range() {
        assert!(matches!(parse_duration("1e300"), Err(ProbeFailure::OutOfRange(_))));
    }

    #[test]
    fn sub_nanosecond_duration_is_not_positive() {
        assert!(matches!(parse_duration("1e-12"), Err(ProbeFailure::NonPositive(_))));
        assert_eq!(parse_duration("1e-9").unwrap(), Duration::from_nanos(1));
    }

    #[test]
    fn missing_program_is_a_probe_error() {
        let prober = CommandProber::ffprobe("/nonexistent/bin/ffprobe");
        let err = prober.probe(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(
            err,
            LoopError::Probe {
                kind: ProbeFailure::ToolUnavailable(_),
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn reads_duration_from_tool_stdout() {
        let prober = CommandProber::new("sh", ["-c", "echo 5.0", "probe"]);
        assert_eq!(prober.probe(Path::new("clip.mp4")).unwrap(), Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_a_probe_error() {
        let prober = CommandProber::new("sh", ["-c", "echo missing >&2; exit 3", "probe"]);
        let err = prober.probe(Path::new("clip.mp4")).unwrap_err();
        match err {
            LoopError::Probe {
                kind: ProbeFailure::ToolFailed { status, stderr },
                ..
            } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr.trim(), "missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn path_is_passed_as_last_argument() {
        let prober = CommandProber::new("sh", ["-c", "test \"$1\" = clip.mp4 && echo 2.5", "probe"]);
        assert_eq!(
            prober.probe(Path::new("clip.mp4")).unwrap(),
            Duration::from_millis(2500)
        );
    }

    #[cfg(unix)]
    #[test]
    fn hung_tool_is_killed_after_timeout() {
        let prober = CommandProber::new("sh", ["-c", "exec sleep 30", "probe"])
            .with_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = prober.probe(Path::new("clip.mp4")).unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(
            err,
            LoopError::Probe {
                kind: ProbeFailure::TimedOut(limit),
                ..
            } if limit == Duration::from_millis(100)
        ));
    }

    #[test]
    fn ffprobe_uses_default_timeout() {
        assert_eq!(CommandProber::ffprobe("ffprobe").timeout(), DEFAULT_PROBE_TIMEOUT);
    }

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl DurationProber for Counting {
        fn probe(&self, path: &Path) -> Result<Duration> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LoopError::Probe {
                    path: path.to_path_buf(),
                    kind: ProbeFailure::EmptyOutput,
                });
            }
            Ok(Duration::from_secs(5))
        }
    }

    #[test]
    fn cache_probes_each_path_once() {
        let cached = CachedProber::new(Counting {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        cached.probe(Path::new("a.mp4")).unwrap();
        cached.probe(Path::new("a.mp4")).unwrap();
        cached.probe(Path::new("b.mp4")).unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cache_does_not_remember_failures() {
        let cached = CachedProber::new(Counting {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        assert!(cached.probe(Path::new("a.mp4")).is_err());
        assert!(cached.probe(Path::new("a.mp4")).is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
