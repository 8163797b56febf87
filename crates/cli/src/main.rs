use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rtsp_loop::config::{
    self, DEFAULT_ADDRESS, DEFAULT_PORT, DEFAULT_PROBE_PROGRAM, DEFAULT_PROBE_TIMEOUT,
};
use rtsp_loop::{DebugLevel, ServerConfig, SourceCatalog};
use rtsp_loop_gst::LoopServer;

#[derive(Parser, Debug)]
#[command(
    name = "rtsp-loop-server",
    about = "Serve H.264 MP4 files over RTSP, looping each client's stream forever"
)]
struct Args {
    /// RTSP service port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Comma-separated endpoint names, served at rtsp://<host>:<port>/<endpoint>
    #[arg(long = "stream-uri", alias = "stream_uri", required = true)]
    stream_uri: String,

    /// Log verbosity: 0 warnings only, 1 lifecycle, 2 every graph message
    #[arg(long, default_value_t = 1)]
    debug: u8,

    /// Bind address
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    address: String,

    /// Media file for an endpoint, as ENDPOINT=PATH (repeatable)
    #[arg(long = "source", value_name = "ENDPOINT=PATH")]
    sources: Vec<String>,

    /// Directory holding <endpoint>.mp4 for endpoints without --source
    #[arg(long, default_value = ".")]
    media_dir: PathBuf,

    /// Program used to probe media durations
    #[arg(long, default_value = DEFAULT_PROBE_PROGRAM)]
    ffprobe: PathBuf,

    /// Seconds a duration probe may run before it is killed
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT.as_secs())]
    probe_timeout: u64,

    /// Only offer interleaved TCP transport
    #[arg(long)]
    tcp_only: bool,

    /// Probe each media file once per process instead of once per client
    #[arg(long)]
    cache_durations: bool,
}

impl Args {
    fn into_config(self) -> rtsp_loop::Result<ServerConfig> {
        let mut config = ServerConfig {
            address: self.address,
            port: self.port,
            endpoints: config::parse_endpoints(&self.stream_uri)?,
            sources: SourceCatalog::new(
                self.media_dir,
                config::parse_source_bindings(&self.sources)?,
            ),
            debug: DebugLevel::from_level(self.debug)?,
            probe_program: self.ffprobe,
            cache_durations: self.cache_durations,
            probe_timeout: Duration::from_secs(self.probe_timeout),
            ..ServerConfig::default()
        };
        config.transport.reliable_only = self.tcp_only;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = DebugLevel::from_level(args.debug).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_max_level(level.max_level())
        .init();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let server = match LoopServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to set up server");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run() {
        tracing::error!(error = %e, "failed to start server");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
