use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LoopError, Result};
use crate::source::SourceCatalog;

pub const DEFAULT_PORT: u16 = 8554;
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PROBE_PROGRAM: &str = "ffprobe";

/// Subtracted from the probed duration so the loop seek never targets the
/// exact end of stream.
pub const DEFAULT_LOOP_MARGIN: Duration = Duration::from_secs(1);

/// Delay between the first duration notification and the initial seek.
pub const DEFAULT_SEEK_DELAY: Duration = Duration::from_millis(25);

/// Longest a duration probe may run before it is killed.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Log verbosity selected with `--debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DebugLevel {
    /// Warnings and errors only.
    Quiet,
    /// Lifecycle lines: requests, probed durations, seeks.
    #[default]
    Info,
    /// Every graph message the supervisor observes.
    Verbose,
}

impl DebugLevel {
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Self::Quiet),
            1 => Ok(Self::Info),
            2 => Ok(Self::Verbose),
            other => Err(LoopError::Config(format!(
                "debug level must be 0, 1 or 2, got {other}"
            ))),
        }
    }

    /// Most verbose `tracing` level that should be emitted.
    pub fn max_level(self) -> tracing::Level {
        match self {
            Self::Quiet => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Verbose => tracing::Level::DEBUG,
        }
    }
}

/// Per-media transport policy applied when the RTSP layer configures a
/// freshly constructed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPolicy {
    /// Let one media object serve several sessions. Each request still
    /// gets its own container; this only affects the media object.
    pub shared: bool,
    /// Retransmission buffers go stale across loop seeks, so this is off.
    pub retransmission: bool,
    /// Restrict lower transport to interleaved TCP.
    pub reliable_only: bool,
    /// Stop the media when its last client disconnects.
    pub stop_on_disconnect: bool,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            shared: true,
            retransmission: false,
            reliable_only: false,
            stop_on_disconnect: true,
        }
    }
}

/// Immutable server configuration, built once at startup and shared by
/// every component through an `Arc`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the RTSP listener binds to.
    pub address: String,
    /// RTSP service port.
    pub port: u16,
    /// Endpoint names; each is mounted at `/<name>`.
    pub endpoints: Vec<String>,
    /// Endpoint → media file bindings.
    pub sources: SourceCatalog,
    pub debug: DebugLevel,
    pub loop_margin: Duration,
    pub seek_delay: Duration,
    pub transport: TransportPolicy,
    /// Program used to probe media durations.
    pub probe_program: PathBuf,
    /// Probe each media file once per process instead of once per client.
    pub cache_durations: bool,
    /// Kill a probe that runs longer than this.
    pub probe_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            endpoints: Vec::new(),
            sources: SourceCatalog::default(),
            debug: DebugLevel::default(),
            loop_margin: DEFAULT_LOOP_MARGIN,
            seek_delay: DEFAULT_SEEK_DELAY,
            transport: TransportPolicy::default(),
            probe_program: PathBuf::from(DEFAULT_PROBE_PROGRAM),
            cache_durations: false,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Configuration for the given comma-separated endpoint list, with
    /// every other field at its default.
    pub fn for_endpoints(stream_uri: &str) -> Result<Self> {
        let config = Self {
            endpoints: parse_endpoints(stream_uri)?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// `address:port` string for logs and bind errors.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Check the invariants every startup path relies on.
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout.is_zero() {
            return Err(LoopError::Config("probe timeout must be non-zero".into()));
        }
        if self.port == 0 {
            return Err(LoopError::Config("port must be non-zero".into()));
        }
        if self.endpoints.is_empty() {
            return Err(LoopError::Config("at least one endpoint is required".into()));
        }
        for endpoint in &self.endpoints {
            validate_endpoint_name(endpoint)?;
        }
        for bound in self.sources.bound_endpoints() {
            if !self.endpoints.iter().any(|e| e == bound) {
                return Err(LoopError::Config(format!(
                    "source bound to `{bound}`, which is not in the endpoint list"
                )));
            }
        }
        Ok(())
    }
}

/// Split the `stream_uri` option into endpoint names.
///
/// Surrounding whitespace and a leading `/` are stripped from each name.
/// Empty lists, empty names and duplicates are rejected.
pub fn parse_endpoints(stream_uri: &str) -> Result<Vec<String>> {
    let mut endpoints = Vec::new();
    for raw in stream_uri.split(',') {
        let name = raw.trim().trim_start_matches('/');
        validate_endpoint_name(name)?;
        if endpoints.iter().any(|e| e == name) {
            return Err(LoopError::Config(format!("duplicate endpoint `{name}`")));
        }
        endpoints.push(name.to_string());
    }
    Ok(endpoints)
}

/// Parse a `name=path` media binding.
pub fn parse_source_binding(binding: &str) -> Result<(String, PathBuf)> {
    let (name, path) = binding.split_once('=').ok_or_else(|| {
        LoopError::Config(format!("source `{binding}` must have the form ENDPOINT=PATH"))
    })?;
    let name = name.trim().trim_start_matches('/');
    validate_endpoint_name(name)?;
    let path = path.trim();
    if path.is_empty() {
        return Err(LoopError::Config(format!("source for `{name}` has an empty path")));
    }
    Ok((name.to_string(), PathBuf::from(path)))
}

/// Collect repeated `name=path` bindings, rejecting duplicates.
pub fn parse_source_bindings<I, S>(bindings: I) -> Result<BTreeMap<String, PathBuf>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut map = BTreeMap::new();
    for binding in bindings {
        let (name, path) = parse_source_binding(binding.as_ref())?;
        if map.insert(name.clone(), path).is_some() {
            return Err(LoopError::Config(format!("source for `{name}` given twice")));
        }
    }
    Ok(map)
}

fn validate_endpoint_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LoopError::Config("endpoint names must not be empty".into()));
    }
    if name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(LoopError::Config(format!(
            "endpoint `{name}` must not contain `/` or whitespace"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_split_on_commas() {
        assert_eq!(parse_endpoints("a,b").unwrap(), vec!["a", "b"]);
        assert_eq!(parse_endpoints(" cam1 , /cam2").unwrap(), vec!["cam1", "cam2"]);
    }

    #[test]
    fn endpoints_reject_empty_and_duplicates() {
        assert!(parse_endpoints("").is_err());
        assert!(parse_endpoints("a,,b").is_err());
        assert!(parse_endpoints("a,a").is_err());
        assert!(parse_endpoints("a/b").is_err());
    }

    #[test]
    fn source_binding_parses() {
        let (name, path) = parse_source_binding("test=sample-5s.mp4").unwrap();
        assert_eq!(name, "test");
        assert_eq!(path, PathBuf::from("sample-5s.mp4"));
        assert!(parse_source_binding("test").is_err());
        assert!(parse_source_binding("test=").is_err());
    }

    #[test]
    fn duplicate_source_bindings_rejected() {
        assert!(parse_source_bindings(["a=1.mp4", "a=2.mp4"]).is_err());
        assert_eq!(parse_source_bindings(["a=1.mp4", "b=2.mp4"]).unwrap().len(), 2);
    }

    #[test]
    fn debug_levels() {
        assert_eq!(DebugLevel::from_level(0).unwrap(), DebugLevel::Quiet);
        assert_eq!(DebugLevel::from_level(2).unwrap().max_level(), tracing::Level::DEBUG);
        assert!(DebugLevel::from_level(3).is_err());
    }

    #[test]
    fn validate_rejects_port_zero_and_stray_sources() {
        let mut config = ServerConfig::for_endpoints("a").unwrap();
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::for_endpoints("a").unwrap();
        config.sources = SourceCatalog::new(".", parse_source_bindings(["b=b.mp4"]).unwrap());
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_follow_the_cli_contract() {
        let config = ServerConfig::for_endpoints("test").unwrap();
        assert_eq!(config.port, 8554);
        assert_eq!(config.bind_addr(), "0.0.0.0:8554");
        assert_eq!(config.seek_delay, Duration::from_millis(25));
        assert_eq!(config.loop_margin, Duration::from_secs(1));
        assert!(config.transport.shared);
        assert!(!config.transport.retransmission);
    }
}
