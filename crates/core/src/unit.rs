use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::graph::{GraphDescription, MediaToolkit};
use crate::probe::DurationProber;
use crate::source::MediaSource;

/// One client's playback graph plus the bookkeeping needed to loop it.
///
/// Built per request and dropped with the container that ends up owning
/// the graph. Nothing in a unit is shared with other clients.
#[derive(Debug)]
pub struct PlaybackUnit<G> {
    source: MediaSource,
    loop_point: Duration,
    description: GraphDescription,
    graph: G,
}

impl<G> PlaybackUnit<G> {
    /// Probe `path`, then instantiate its playback graph.
    ///
    /// The probe runs first so a missing or unreadable file never reaches
    /// the toolkit. Both probe and graph failures are returned to the
    /// caller, which fails only this client's request.
    pub fn build<T>(
        endpoint: &str,
        path: PathBuf,
        prober: &dyn DurationProber,
        toolkit: &T,
        loop_margin: Duration,
    ) -> Result<Self>
    where
        T: MediaToolkit<Graph = G>,
    {
        let duration = prober.probe(&path)?;
        let source = MediaSource {
            endpoint: endpoint.to_string(),
            path,
            duration,
        };
        let loop_point = source.loop_point(loop_margin);

        tracing::info!(
            endpoint,
            path = %source.path.display(),
            duration = duration.as_secs_f64(),
            loop_point = loop_point.as_secs_f64(),
            "media length probed"
        );

        let description = GraphDescription::for_file(&source.path);
        let graph = toolkit.parse_graph(&description)?;

        Ok(Self {
            source,
            loop_point,
            description,
            graph,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.source.endpoint
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    /// Stop position of every loop seek.
    pub fn loop_point(&self) -> Duration {
        self.loop_point
    }

    pub fn description(&self) -> &GraphDescription {
        &self.description
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Hand the graph over to the container being assembled.
    pub fn into_graph(self) -> G {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{LoopError, ProbeFailure};
    use crate::graph::SeekTarget;
    use crate::supervisor::SessionSupervisor;

    struct Fixed(Option<Duration>);

    impl DurationProber for Fixed {
        fn probe(&self, path: &Path) -> Result<Duration> {
            self.0.ok_or_else(|| LoopError::Probe {
                path: path.to_path_buf(),
                kind: ProbeFailure::EmptyOutput,
            })
        }
    }

    #[derive(Default)]
    struct Launches(AtomicUsize);

    impl MediaToolkit for Launches {
        type Graph = String;
        type Container = ();

        fn parse_graph(&self, description: &GraphDescription) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(description.to_string())
        }

        fn assemble(
            &self,
            _unit: PlaybackUnit<String>,
            _supervisor: Arc<SessionSupervisor>,
        ) -> Result<()> {
            Ok(())
        }

        fn seek_target(&self, _container: &()) -> Box<dyn SeekTarget> {
            unreachable!("units never seek")
        }
    }

    #[test]
    fn loop_point_leaves_one_second_margin() {
        let toolkit = Launches::default();
        let unit = PlaybackUnit::build(
            "test",
            PathBuf::from("sample-5s.mp4"),
            &Fixed(Some(Duration::from_secs(5))),
            &toolkit,
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(unit.endpoint(), "test");
        assert_eq!(unit.source().duration, Duration::from_secs(5));
        assert_eq!(unit.loop_point(), Duration::from_secs(4));
        assert_eq!(unit.graph(), unit.description().as_str());
    }

    #[test]
    fn failed_probe_skips_graph() {
        let toolkit = Launches::default();
        let err = PlaybackUnit::build(
            "test",
            PathBuf::from("missing.mp4"),
            &Fixed(None),
            &toolkit,
            Duration::from_secs(1),
        )
        .unwrap_err();

        assert!(matches!(err, LoopError::Probe { .. }));
        assert_eq!(toolkit.0.load(Ordering::SeqCst), 0);
    }
}
