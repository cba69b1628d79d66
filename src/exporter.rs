use std::sync::Arc;

use prometheus::{IntGaugeVec, Opts};

use crate::config::{ProbeSettings, ProbeTarget};
use crate::http_probe::Probe;
use crate::metrics::{
    MetricAggregator, MetricDescriptor, MetricsError, Snapshot, describe, encode_text,
};
use crate::scrape::{CycleReport, ScrapeOrchestrator};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The pull interface: `describe` lists what can be produced, `collect`
/// runs a collection cycle and returns the resulting distributions.
pub struct LatencyExporter<P> {
    orchestrator: ScrapeOrchestrator<P>,
    aggregator: Arc<MetricAggregator>,
}

impl<P: Probe> LatencyExporter<P> {
    pub fn new(
        targets: Arc<[ProbeTarget]>,
        probe: P,
        settings: &ProbeSettings,
    ) -> Result<Self, MetricsError> {
        let aggregator = Arc::new(MetricAggregator::new(
            targets.iter().map(|target| target.label().to_string()),
            &settings.buckets,
        )?);

        let build_info = IntGaugeVec::new(
            Opts::new(
                "latency_exporter_build_info",
                "A metric with a constant '1' value labeled by the exporter version.",
            ),
            &["version"],
        )?;
        build_info.with_label_values(&[VERSION]).set(1);
        aggregator.registry().register(Box::new(build_info))?;

        let orchestrator = ScrapeOrchestrator::new(
            targets,
            Arc::new(probe),
            Arc::clone(&aggregator),
            settings.max_concurrency,
            settings.deadline(),
        );

        Ok(Self {
            orchestrator,
            aggregator,
        })
    }

    pub fn describe(&self) -> Vec<MetricDescriptor> {
        describe(&self.aggregator.targets())
    }

    /// Runs one collection cycle. Never fails: probe errors are logged and
    /// only show up as missing samples.
    pub async fn collect(&self) -> (CycleReport, Snapshot) {
        self.orchestrator.run_cycle().await
    }

    /// Runs one collection cycle and encodes it in the Prometheus text format.
    pub async fn render(&self) -> Result<String, MetricsError> {
        let (_, snapshot) = self.collect().await;
        encode_text(&snapshot)
    }

    /// Current state without probing anything.
    pub fn snapshot(&self) -> Snapshot {
        self.aggregator.snapshot()
    }

    pub fn targets(&self) -> &[ProbeTarget] {
        self.orchestrator.targets()
    }
}
