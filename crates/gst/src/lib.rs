//! GStreamer backend for the looping RTSP file server.
//!
//! Wires the toolkit-agnostic pieces of `rtsp-loop` onto
//! `gst-rtsp-server`:
//!
//! | Type                   | Role                                                     |
//! |------------------------|----------------------------------------------------------|
//! | [`LoopBin`]            | `gst::Bin` whose message handler feeds a supervisor      |
//! | [`GstToolkit`]         | Parses launch lines and assembles per-client containers  |
//! | [`MainContextScheduler`] | One-shot timers on a GLib main context                 |
//! | [`LoopMediaFactory`]   | `RTSPMediaFactory` that builds one container per request |
//! | [`LoopServer`]         | Owns the RTSP server, its mounts and the main loop       |
//!
//! ## Usage
//!
//! ```no_run
//! use rtsp_loop::ServerConfig;
//! use rtsp_loop_gst::LoopServer;
//!
//! let config = ServerConfig::for_endpoints("test").unwrap();
//! LoopServer::new(config).unwrap().run().unwrap();
//! ```

mod factory;
mod loopbin;
mod message;
mod scheduler;
mod server;
mod toolkit;

use std::sync::LazyLock;

pub use factory::LoopMediaFactory;
pub use loopbin::LoopBin;
pub use message::translate;
pub use scheduler::MainContextScheduler;
pub use server::LoopServer;
pub use toolkit::{CONTAINER_NAME, ContainerSeek, GstToolkit, UNIT_NAME};

pub(crate) static CAT: LazyLock<gst::DebugCategory> = LazyLock::new(|| {
    gst::DebugCategory::new(
        "rtsploop",
        gst::DebugColorFlags::empty(),
        Some("Looping RTSP file server"),
    )
});
