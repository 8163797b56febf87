use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{LoopError, Result};
use crate::factory::MountFactory;
use crate::graph::MediaToolkit;
use crate::probe::DurationProber;
use crate::schedule::Scheduler;

/// The RTSP layer's table of mount paths.
pub trait MountPoints<T: MediaToolkit> {
    /// Publish `factory` under `path`.
    fn add_factory(&self, path: &str, factory: Arc<MountFactory<T>>) -> Result<()>;
}

/// Endpoint → mount factory bindings, fixed at startup.
///
/// Built once from the configured endpoint list; there is no API to add or
/// remove mounts afterwards. Requests are routed to a factory by the RTSP
/// layer's own mount table, filled by [`bind`](Self::bind).
pub struct Registrar<T: MediaToolkit> {
    config: Arc<ServerConfig>,
    mounts: BTreeMap<String, Arc<MountFactory<T>>>,
}

impl<T: MediaToolkit> Registrar<T> {
    /// One factory per configured endpoint, mounted at `/<endpoint>`.
    pub fn new(
        config: Arc<ServerConfig>,
        toolkit: Arc<T>,
        prober: Arc<dyn DurationProber>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        config.validate()?;

        let mut mounts = BTreeMap::new();
        for endpoint in &config.endpoints {
            let factory = MountFactory::new(
                endpoint,
                config.clone(),
                toolkit.clone(),
                prober.clone(),
                scheduler.clone(),
            );
            let path = factory.path();
            if mounts.insert(path.clone(), Arc::new(factory)).is_some() {
                return Err(LoopError::Config(format!("mount `{path}` configured twice")));
            }
        }

        Ok(Self { config, mounts })
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    /// Registered mount paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        self.mounts.keys().map(String::as_str).collect()
    }

    /// Publish every factory on `mounts`.
    pub fn bind(&self, mounts: &impl MountPoints<T>) -> Result<()> {
        for (path, factory) in &self.mounts {
            mounts.add_factory(path, factory.clone())?;
            tracing::info!(path = %path, "mount registered");
        }
        Ok(())
    }
}
