use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::config::ProbeTarget;
use crate::http_probe::{Probe, report};
use crate::metrics::{MetricAggregator, Snapshot};

/// Outcome counts of one collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub probed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Runs one probe per target and folds the results into the aggregator.
///
/// Cycles are serialized: a cycle holds the cycle lock from fan-out until its
/// snapshot is taken, so a concurrent caller waits and then sees a state that
/// includes every record of the cycle before it.
pub struct ScrapeOrchestrator<P> {
    targets: Arc<[ProbeTarget]>,
    probe: Arc<P>,
    aggregator: Arc<MetricAggregator>,
    limiter: Arc<Semaphore>,
    deadline: Duration,
    cycle: Mutex<u64>,
}

impl<P: Probe> ScrapeOrchestrator<P> {
    pub fn new(
        targets: Arc<[ProbeTarget]>,
        probe: Arc<P>,
        aggregator: Arc<MetricAggregator>,
        max_concurrency: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            targets,
            probe,
            aggregator,
            limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
            deadline,
            cycle: Mutex::new(0),
        }
    }

    pub fn targets(&self) -> &[ProbeTarget] {
        &self.targets
    }

    pub async fn run_cycle(&self) -> (CycleReport, Snapshot) {
        let mut cycle = self.cycle.lock().await;
        *cycle += 1;
        let started = Instant::now();

        // Dropping the set aborts the probes, so an abandoned cycle cannot
        // keep recording after its lock is released.
        let mut tasks = JoinSet::new();
        for target in self.targets.iter() {
            let target = target.clone();
            let probe = Arc::clone(&self.probe);
            let aggregator = Arc::clone(&self.aggregator);
            let limiter = Arc::clone(&self.limiter);
            let deadline = self.deadline;

            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await;
                match probe.probe(&target, deadline).await {
                    Ok(record) => {
                        aggregator.record(&record);
                        true
                    }
                    Err(failed) => {
                        log::warn!("{}", report(&failed));
                        aggregator.record(&failed.partial);
                        false
                    }
                }
            });
        }

        let mut succeeded = 0;
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => succeeded += 1,
                Ok(false) => failed += 1,
                Err(err) => {
                    log::error!("Probe task did not complete: {err}");
                    failed += 1;
                }
            }
        }

        let report = CycleReport {
            cycle: *cycle,
            probed: self.targets.len(),
            succeeded,
            failed,
            elapsed: started.elapsed(),
        };
        log::debug!(
            "Collection cycle {} probed {} targets in {:?} ({} ok, {} failed)",
            report.cycle,
            report.probed,
            report.elapsed,
            report.succeeded,
            report.failed
        );

        let snapshot = self.aggregator.snapshot();
        (report, snapshot)
    }
}
