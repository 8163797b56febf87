use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{LoopError, Result};
use crate::graph::{MediaToolkit, TransportSettings};
use crate::probe::DurationProber;
use crate::schedule::Scheduler;
use crate::supervisor::SessionSupervisor;
use crate::unit::PlaybackUnit;

/// A freshly built top-level container and the supervisor looping it.
pub struct Container<C> {
    handle: C,
    supervisor: Arc<SessionSupervisor>,
}

impl<C> Container<C> {
    pub fn handle(&self) -> &C {
        &self.handle
    }

    pub fn supervisor(&self) -> &Arc<SessionSupervisor> {
        &self.supervisor
    }

    /// Give the container to the transport layer. The supervisor stays
    /// reachable through the container's supervised bin.
    pub fn into_handle(self) -> C {
        self.handle
    }
}

/// Builds one isolated container per client request on a single mount.
///
/// Every call to [`create_for_request`](Self::create_for_request) probes the
/// media, builds a new graph, and attaches a new supervisor. Clients of the
/// same mount never share a graph, so each loops on its own timing.
pub struct MountFactory<T: MediaToolkit> {
    endpoint: String,
    config: Arc<ServerConfig>,
    toolkit: Arc<T>,
    prober: Arc<dyn DurationProber>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: MediaToolkit> MountFactory<T> {
    pub fn new(
        endpoint: &str,
        config: Arc<ServerConfig>,
        toolkit: Arc<T>,
        prober: Arc<dyn DurationProber>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            config,
            toolkit,
            prober,
            scheduler,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Mount path, e.g. `/test`.
    pub fn path(&self) -> String {
        format!("/{}", self.endpoint)
    }

    /// Build a supervised container for one client.
    ///
    /// Probe and graph failures are returned, not raised: the caller fails
    /// this request and keeps serving everyone else.
    pub fn create_for_request(&self, request_uri: &str) -> Result<Container<T::Container>> {
        tracing::info!(endpoint = %self.endpoint, request_uri, "stream request");

        if !self.config.endpoints.iter().any(|e| *e == self.endpoint) {
            return Err(LoopError::UnknownEndpoint(self.endpoint.clone()));
        }
        let path = self.config.sources.path_for(&self.endpoint);

        let unit = PlaybackUnit::build(
            &self.endpoint,
            path,
            self.prober.as_ref(),
            self.toolkit.as_ref(),
            self.config.loop_margin,
        )?;

        let supervisor = SessionSupervisor::new(
            &self.endpoint,
            unit.loop_point(),
            self.config.seek_delay,
            self.scheduler.clone(),
        );
        let handle = self.toolkit.assemble(unit, supervisor.clone())?;
        supervisor.attach_target(self.toolkit.seek_target(&handle));

        Ok(Container { handle, supervisor })
    }

    /// Apply the configured transport policy to a new media session.
    pub fn configure(&self, media: &dyn TransportSettings) {
        let policy = &self.config.transport;
        media.set_shared(policy.shared);
        media.set_retransmission(policy.retransmission);
        media.set_reliable_only(policy.reliable_only);
        media.set_stop_on_disconnect(policy.stop_on_disconnect);
        tracing::info!(
            endpoint = %self.endpoint,
            shared = policy.shared,
            retransmission = policy.retransmission,
            reliable_only = policy.reliable_only,
            "configure request"
        );
    }
}
