use std::sync::Arc;

use gst::glib;
use gst_rtsp_server::prelude::*;

use rtsp_loop::{
    CachedProber, CommandProber, DurationProber, LoopError, MountFactory, MountPoints, Registrar,
    Result, ServerConfig,
};

use crate::{GstToolkit, LoopMediaFactory, MainContextScheduler};

/// The RTSP server with one looping mount per configured endpoint.
///
/// All server work (client I/O, media setup, the delayed initial seeks)
/// is dispatched on the default GLib main context; [`run`](Self::run)
/// iterates it until the process is stopped.
pub struct LoopServer {
    server: gst_rtsp_server::RTSPServer,
    registrar: Registrar<GstToolkit>,
    context: glib::MainContext,
    main_loop: glib::MainLoop,
    source: Option<glib::SourceId>,
}

impl LoopServer {
    /// Initialize GStreamer, build the mounts and configure the listener.
    /// Nothing is bound until [`start`](Self::start).
    pub fn new(config: ServerConfig) -> Result<Self> {
        gst::init().map_err(|e| LoopError::Toolkit(e.to_string()))?;

        let config = Arc::new(config);
        let command = CommandProber::ffprobe(config.probe_program.clone())
            .with_timeout(config.probe_timeout);
        let prober: Arc<dyn DurationProber> = if config.cache_durations {
            Arc::new(CachedProber::new(command))
        } else {
            Arc::new(command)
        };

        let context = glib::MainContext::default();
        let registrar = Registrar::new(
            config.clone(),
            Arc::new(GstToolkit),
            prober,
            Arc::new(MainContextScheduler::new(context.clone())),
        )?;

        let server = gst_rtsp_server::RTSPServer::new();
        server.set_address(&config.address);
        server.set_service(&config.port.to_string());

        let mounts = server
            .mount_points()
            .ok_or_else(|| LoopError::Toolkit("RTSP server has no mount points".to_string()))?;
        registrar.bind(&RtspMounts(mounts))?;

        let main_loop = glib::MainLoop::new(Some(&context), false);

        Ok(Self {
            server,
            registrar,
            context,
            main_loop,
            source: None,
        })
    }

    /// Bind the listener and attach it to the main context.
    pub fn start(&mut self) -> Result<()> {
        if self.source.is_some() {
            return Err(LoopError::Toolkit("server already started".to_string()));
        }

        let addr = self.registrar.config().bind_addr();
        let source = self
            .server
            .attach(Some(&self.context))
            .map_err(|e| LoopError::ListenerBind {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        self.source = Some(source);

        tracing::info!(addr = %addr, port = self.bound_port(), "RTSP server listening");
        for path in self.registrar.paths() {
            tracing::info!(mount = path, "streaming begun at {}", path);
        }
        Ok(())
    }

    /// Detach the listener. Sessions already running keep their media
    /// until the main loop stops.
    pub fn stop(&mut self) {
        if let Some(id) = self.source.take()
            && let Some(source) = self.context.find_source_by_id(&id)
        {
            source.destroy();
            tracing::info!("server stopping");
        }
    }

    pub fn is_running(&self) -> bool {
        self.source.is_some()
    }

    /// Port the listener is bound to, or -1 before [`start`](Self::start).
    pub fn bound_port(&self) -> i32 {
        self.server.bound_port()
    }

    /// Handle to the loop [`run`](Self::run) blocks on, for quitting it
    /// from elsewhere.
    pub fn main_loop(&self) -> glib::MainLoop {
        self.main_loop.clone()
    }

    /// Start if needed, then serve until the main loop is quit.
    pub fn run(mut self) -> Result<()> {
        if !self.is_running() {
            self.start()?;
        }
        self.main_loop.run();
        self.stop();
        Ok(())
    }
}

struct RtspMounts(gst_rtsp_server::RTSPMountPoints);

impl MountPoints<GstToolkit> for RtspMounts {
    fn add_factory(&self, path: &str, mount: Arc<MountFactory<GstToolkit>>) -> Result<()> {
        self.0.add_factory(path, LoopMediaFactory::new(mount));
        Ok(())
    }
}
