use prometheus::{Encoder, TextEncoder};

use super::MetricsError;
use super::aggregator::Snapshot;

/// Encodes the families gathered into `snapshot` in the Prometheus text
/// exposition format.
pub fn encode_text(snapshot: &Snapshot) -> Result<String, MetricsError> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&snapshot.families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http_probe::{PhaseTiming, TimingRecord};
    use crate::metrics::MetricAggregator;

    fn sample_snapshot() -> Snapshot {
        let agg = MetricAggregator::new(["http://a"], &[0.01, 0.1]).expect("aggregator");
        agg.record(&TimingRecord {
            target: "http://a".to_string(),
            dns: PhaseTiming::Measured(Duration::from_millis(2)),
            connect: PhaseTiming::Measured(Duration::from_millis(3)),
            tls: PhaseTiming::Skipped,
            ttfb: PhaseTiming::Measured(Duration::from_millis(40)),
            round_trip: PhaseTiming::Measured(Duration::from_millis(200)),
            http_status: Some(200),
        });
        agg.snapshot()
    }

    #[test]
    fn test_text_format() {
        let text = encode_text(&sample_snapshot()).expect("encode");
        assert!(text.contains("# TYPE latency_url_metric_rtt_latency_seconds histogram"));
        assert!(text.contains("latency_url_metric_dns_latency_seconds_bucket{url=\"http://a\",le=\"0.01\"} 1"));
        assert!(text.contains("latency_url_metric_rtt_latency_seconds_bucket{url=\"http://a\",le=\"0.1\"} 0"));
        assert!(text.contains("latency_url_metric_rtt_latency_seconds_bucket{url=\"http://a\",le=\"+Inf\"} 1"));
        assert!(text.contains("latency_url_metric_sslshake_latency_seconds_count{url=\"http://a\"} 1"));
        assert!(text.contains("latency_url_metric_sslshake_latency_seconds_sum{url=\"http://a\"} 0"));
    }

    #[test]
    fn test_empty_snapshot_encodes_to_nothing() {
        let agg = MetricAggregator::new(Vec::<String>::new(), &[0.1]).expect("aggregator");
        let text = encode_text(&agg.snapshot()).expect("encode");
        assert!(text.is_empty());
    }
}
