use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::ProbeTarget;
use crate::http_probe::{Probe, ProbeError, ProbeFailed, PhaseTiming, TimingRecord};

/// Deterministic probe double.
///
/// Targets whose label contains `fail` fail after DNS; targets containing
/// `hang` never answer and run into the deadline. Everything else succeeds
/// with fixed timings after `delay`.
pub(crate) struct StubProbe {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    delay: Duration,
}

impl StubProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay,
        }
    }
}

pub(crate) fn fixed_record(target: &str) -> TimingRecord {
    TimingRecord {
        target: target.to_string(),
        dns: PhaseTiming::Measured(Duration::from_millis(2)),
        connect: PhaseTiming::Measured(Duration::from_millis(5)),
        tls: PhaseTiming::Skipped,
        ttfb: PhaseTiming::Measured(Duration::from_millis(20)),
        round_trip: PhaseTiming::Measured(Duration::from_millis(25)),
        http_status: Some(200),
    }
}

fn after_dns(target: &str) -> TimingRecord {
    TimingRecord {
        connect: PhaseTiming::Failed,
        ttfb: PhaseTiming::Failed,
        round_trip: PhaseTiming::Failed,
        http_status: None,
        ..fixed_record(target)
    }
}

impl Probe for StubProbe {
    async fn probe(
        &self,
        target: &ProbeTarget,
        deadline: Duration,
    ) -> Result<TimingRecord, ProbeFailed> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let label = target.label();
        let delay = if label.contains("hang") {
            Duration::from_secs(60)
        } else {
            self.delay
        };
        let slept = tokio::time::timeout(deadline, tokio::time::sleep(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if slept.is_err() {
            return Err(ProbeFailed::new(
                after_dns(label),
                ProbeError::DeadlineExceeded(deadline),
            ));
        }
        if label.contains("fail") {
            return Err(ProbeFailed::new(after_dns(label), ProbeError::MissingHost));
        }
        Ok(fixed_record(label))
    }
}
