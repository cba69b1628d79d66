use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use prometheus::proto::MetricFamily;
use prometheus::{HistogramOpts, HistogramVec, Registry};

use super::histogram::{Distribution, PhaseHistogram};
use super::{MetricsError, TARGET_LABEL, metric_help, metric_name};
use crate::http_probe::{Phase, TimingRecord};

/// Distribution of one phase for one target at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSeries {
    pub target: String,
    pub phase: Phase,
    pub distribution: Distribution,
}

/// Aggregated state read in one go: the per-pair distributions and the
/// gathered metric families for exposition.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub series: Vec<PhaseSeries>,
    pub families: Vec<MetricFamily>,
}

impl Snapshot {
    pub fn get(&self, target: &str, phase: Phase) -> Option<&PhaseSeries> {
        self.series
            .iter()
            .find(|series| series.target == target && series.phase == phase)
    }

    pub fn for_target<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a PhaseSeries> {
        self.series.iter().filter(move |series| series.target == target)
    }
}

struct TargetSeries {
    target: String,
    phases: Vec<PhaseHistogram>,
}

#[derive(Default)]
struct AggregateState {
    index: HashMap<String, usize>,
    targets: Vec<TargetSeries>,
}

/// Accumulates phase durations per (target, phase) into one `HistogramVec`
/// per phase, labelled by target. Records are dropped once folded in.
pub struct MetricAggregator {
    registry: Registry,
    state: RwLock<AggregateState>,
}

impl MetricAggregator {
    /// Tracks exactly `targets`, in the given order. `bounds` are the bucket
    /// upper bounds in seconds.
    pub fn new<I, S>(targets: I, bounds: &[f64]) -> Result<Self, MetricsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Registry::new();
        let histograms = Phase::ALL
            .iter()
            .map(|&phase| -> Result<HistogramVec, MetricsError> {
                let opts = HistogramOpts::new(metric_name(phase), metric_help(phase))
                    .buckets(bounds.to_vec());
                let histogram = HistogramVec::new(opts, &[TARGET_LABEL])?;
                registry.register(Box::new(histogram.clone()))?;
                Ok(histogram)
            })
            .collect::<Result<Vec<_>, MetricsError>>()?;

        let mut state = AggregateState::default();
        for target in targets {
            let target = target.into();
            if state.index.contains_key(&target) {
                continue;
            }
            let phases = histograms
                .iter()
                .map(|histogram| -> Result<PhaseHistogram, MetricsError> {
                    let child = histogram.get_metric_with_label_values(&[target.as_str()])?;
                    PhaseHistogram::new(child)
                })
                .collect::<Result<Vec<_>, MetricsError>>()?;
            state.index.insert(target.clone(), state.targets.len());
            state.targets.push(TargetSeries { target, phases });
        }

        Ok(Self {
            registry,
            state: RwLock::new(state),
        })
    }

    /// Registry holding the phase histograms. Other collectors registered
    /// here are gathered into every snapshot.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Folds one record into its target's distributions under the write lock.
    /// Failed phases add nothing; skipped phases add a zero.
    /// Returns false when the target is not tracked.
    pub fn record(&self, record: &TimingRecord) -> bool {
        let mut state = self.state.write();
        let Some(slot) = state.index.get(&record.target).copied() else {
            log::warn!("Dropping timings for untracked target {}", record.target);
            return false;
        };
        let Some(series) = state.targets.get_mut(slot) else {
            return false;
        };
        for (phase, timing) in record.phases() {
            let Some(value) = timing.sample() else {
                continue;
            };
            if let Some(histogram) = series.phases.get_mut(phase.index()) {
                histogram.observe(value);
            }
        }
        true
    }

    /// Every tracked (target, phase) pair, in target order then phase order,
    /// including pairs that have no samples yet. Families are gathered under
    /// the same read lock, so both views agree.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        let series = state
            .targets
            .iter()
            .flat_map(|target| {
                Phase::ALL
                    .iter()
                    .zip(&target.phases)
                    .map(|(&phase, histogram)| PhaseSeries {
                        target: target.target.clone(),
                        phase,
                        distribution: histogram.distribution(),
                    })
            })
            .collect();
        let families = self.registry.gather();
        Snapshot {
            taken_at: Utc::now(),
            series,
            families,
        }
    }

    pub fn targets(&self) -> Vec<String> {
        self.state
            .read()
            .targets
            .iter()
            .map(|series| series.target.clone())
            .collect()
    }
}
