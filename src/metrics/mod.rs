pub mod aggregator;
pub mod exposition;
pub mod histogram;

use thiserror::Error;

use crate::http_probe::Phase;

pub use aggregator::{MetricAggregator, PhaseSeries, Snapshot};
pub use exposition::encode_text;
pub use histogram::{Distribution, PhaseHistogram};

const NAMESPACE: &str = "latency";
const SUBSYSTEM: &str = "url_metric";
pub const TARGET_LABEL: &str = "url";
pub const UNIT: &str = "seconds";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to create histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("encoded metrics are not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A series the exporter can produce: one phase for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: &'static str,
    pub phase: Phase,
    pub target: String,
    pub unit: &'static str,
}

/// Fully qualified metric name for a phase, e.g.
/// `latency_url_metric_dns_latency_seconds`.
pub fn metric_name(phase: Phase) -> String {
    let stem = match phase {
        Phase::Dns => "dns_latency",
        Phase::Connect => "connect_latency",
        Phase::Tls => "sslshake_latency",
        Phase::Ttfb => "ttfb_latency",
        Phase::RoundTrip => "rtt_latency",
    };
    format!("{NAMESPACE}_{SUBSYSTEM}_{stem}_{UNIT}")
}

pub fn metric_help(phase: Phase) -> &'static str {
    match phase {
        Phase::Dns => "Time taken for DNS resolution to complete.",
        Phase::Connect => "Time taken for TCP connection to complete.",
        Phase::Tls => "Time taken for SSL handshake to complete.",
        Phase::Ttfb => "Time taken till the first byte received.",
        Phase::RoundTrip => "Time taken for the full round trip to complete.",
    }
}

pub fn describe(targets: &[String]) -> Vec<MetricDescriptor> {
    Phase::ALL
        .iter()
        .flat_map(|&phase| {
            targets.iter().map(move |target| MetricDescriptor {
                name: metric_name(phase),
                help: metric_help(phase),
                phase,
                target: target.clone(),
                unit: UNIT,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_keep_the_original_namespace() {
        assert_eq!(metric_name(Phase::Dns), "latency_url_metric_dns_latency_seconds");
        assert_eq!(metric_name(Phase::Tls), "latency_url_metric_sslshake_latency_seconds");
        assert_eq!(metric_name(Phase::RoundTrip), "latency_url_metric_rtt_latency_seconds");
    }

    #[test]
    fn test_describe_covers_every_phase_and_target() {
        let targets = vec!["http://a".to_string(), "http://b".to_string()];
        let descriptors = describe(&targets);
        assert_eq!(descriptors.len(), 10);
        assert!(descriptors.iter().all(|d| d.unit == "seconds"));
        assert_eq!(
            descriptors.iter().filter(|d| d.phase == Phase::Ttfb).count(),
            2
        );
    }
}
