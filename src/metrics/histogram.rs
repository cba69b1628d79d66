use std::time::Duration;

use hdrhistogram::Histogram as Sketch;
use prometheus::Histogram;

use super::MetricsError;

/// Longest duration the quantile sketch resolves, in microseconds. Anything
/// above saturates; the exported histogram still sees the real value.
const MAX_TRACKED_MICROS: u64 = 3_600_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;

/// Point-in-time view of one phase histogram. All values in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub count: u64,
    pub sum: f64,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p99: Option<f64>,
}

/// One (target, phase) pair: the exported Prometheus histogram child plus an
/// HDR sketch for the quantiles shown on the landing page.
#[derive(Clone)]
pub struct PhaseHistogram {
    exported: Histogram,
    sketch: Sketch<u64>,
}

impl PhaseHistogram {
    pub fn new(exported: Histogram) -> Result<Self, MetricsError> {
        let sketch = Sketch::new_with_bounds(1, MAX_TRACKED_MICROS, SIGNIFICANT_FIGURES)?;
        Ok(Self { exported, sketch })
    }

    pub fn observe(&mut self, value: Duration) {
        self.exported.observe(value.as_secs_f64());
        let micros = u64::try_from(value.as_micros()).unwrap_or(u64::MAX);
        self.sketch.saturating_record(micros.min(MAX_TRACKED_MICROS));
    }

    pub fn distribution(&self) -> Distribution {
        Distribution {
            count: self.exported.get_sample_count(),
            sum: self.exported.get_sample_sum(),
            p50: self.quantile(0.50),
            p90: self.quantile(0.90),
            p99: self.quantile(0.99),
        }
    }

    fn quantile(&self, q: f64) -> Option<f64> {
        if self.sketch.len() == 0 {
            return None;
        }
        Some(self.sketch.value_at_quantile(q) as f64 / 1_000_000.0)
    }
}
