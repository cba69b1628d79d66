use std::sync::{Arc, OnceLock};
use std::time::Instant;

use super::result::{ConnectionPhase, PhaseTiming, TimingRecord};

#[derive(Debug, Clone, Copy, Default)]
struct Span {
    started: Option<Instant>,
    outcome: Option<PhaseTiming>,
}

impl Span {
    fn timing(self) -> PhaseTiming {
        match (self.started, self.outcome) {
            (_, Some(outcome)) => outcome,
            (Some(_), None) => PhaseTiming::Failed,
            (None, None) => PhaseTiming::Skipped,
        }
    }
}

/// Records the lifecycle of one outgoing request.
///
/// DNS, connect and TLS are bracketed by `start`/`done` pairs. The first
/// response byte is reported through a shared marker, since it is observed
/// from inside the connection's IO rather than by the caller.
#[derive(Debug)]
pub struct PhaseTimer {
    t0: Instant,
    spans: [Span; 3],
    first_byte: Arc<OnceLock<Instant>>,
    completed: Option<Instant>,
}

impl PhaseTimer {
    pub fn start() -> Self {
        Self::start_at(Instant::now())
    }

    pub(crate) fn start_at(t0: Instant) -> Self {
        Self {
            t0,
            spans: [Span::default(); 3],
            first_byte: Arc::new(OnceLock::new()),
            completed: None,
        }
    }

    pub fn begin(&mut self, phase: ConnectionPhase) {
        self.begin_at(phase, Instant::now());
    }

    pub(crate) fn begin_at(&mut self, phase: ConnectionPhase, at: Instant) {
        let span = &mut self.spans[phase.index()];
        span.started = Some(at);
        span.outcome = None;
    }

    /// Closes a phase. A failed phase is kept as `Failed`, which reads as a
    /// zero duration.
    pub fn done(&mut self, phase: ConnectionPhase, succeeded: bool) {
        self.done_at(phase, succeeded, Instant::now());
    }

    pub(crate) fn done_at(&mut self, phase: ConnectionPhase, succeeded: bool, at: Instant) {
        let span = &mut self.spans[phase.index()];
        span.outcome = match (succeeded, span.started) {
            (true, Some(started)) => Some(PhaseTiming::Measured(at.saturating_duration_since(started))),
            _ => Some(PhaseTiming::Failed),
        };
    }

    /// Marker the IO tap sets when the first response byte arrives.
    pub fn first_byte_marker(&self) -> Arc<OnceLock<Instant>> {
        Arc::clone(&self.first_byte)
    }

    pub fn response_complete(&mut self) {
        self.response_complete_at(Instant::now());
    }

    pub(crate) fn response_complete_at(&mut self, at: Instant) {
        self.completed = Some(at);
    }

    pub fn finish(&self, target: &str, http_status: Option<u16>) -> TimingRecord {
        let ttfb = match self.first_byte.get() {
            Some(at) => PhaseTiming::Measured(at.saturating_duration_since(self.t0)),
            None => PhaseTiming::Failed,
        };
        let round_trip = match self.completed {
            Some(at) => PhaseTiming::Measured(at.saturating_duration_since(self.t0)),
            None => PhaseTiming::Failed,
        };
        // TTFB always falls inside the round trip window.
        let round_trip = match (ttfb, round_trip) {
            (PhaseTiming::Measured(first), PhaseTiming::Measured(total)) => {
                PhaseTiming::Measured(total.max(first))
            }
            (_, round_trip) => round_trip,
        };

        TimingRecord {
            target: target.to_string(),
            dns: self.spans[ConnectionPhase::Dns.index()].timing(),
            connect: self.spans[ConnectionPhase::Connect.index()].timing(),
            tls: self.spans[ConnectionPhase::Tls.index()].timing(),
            ttfb,
            round_trip,
            http_status,
        }
    }
}
