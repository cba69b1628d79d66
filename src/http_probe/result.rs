use std::fmt;
use std::time::Duration;

/// One sub-interval of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Dns,
    Connect,
    Tls,
    Ttfb,
    RoundTrip,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Dns,
        Phase::Connect,
        Phase::Tls,
        Phase::Ttfb,
        Phase::RoundTrip,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Dns => "dns",
            Phase::Connect => "connect",
            Phase::Tls => "tls",
            Phase::Ttfb => "ttfb",
            Phase::RoundTrip => "rtt",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Phase::Dns => 0,
            Phase::Connect => 1,
            Phase::Tls => 2,
            Phase::Ttfb => 3,
            Phase::RoundTrip => 4,
        }
    }
}

/// The phases bracketed around a connection step. TTFB and round trip are
/// observed from the response instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Dns,
    Connect,
    Tls,
}

impl ConnectionPhase {
    pub(crate) fn index(self) -> usize {
        Phase::from(self).index()
    }
}

impl From<ConnectionPhase> for Phase {
    fn from(phase: ConnectionPhase) -> Self {
        match phase {
            ConnectionPhase::Dns => Phase::Dns,
            ConnectionPhase::Connect => Phase::Connect,
            ConnectionPhase::Tls => Phase::Tls,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a single phase.
///
/// `Skipped` means the phase did not apply (cleartext has no TLS, an IP
/// literal needs no lookup). `Failed` means it started, or was due, and never
/// completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTiming {
    Measured(Duration),
    Skipped,
    Failed,
}

impl PhaseTiming {
    /// Duration with skipped and failed phases folded to zero.
    pub fn as_duration(self) -> Duration {
        match self {
            PhaseTiming::Measured(duration) => duration,
            PhaseTiming::Skipped | PhaseTiming::Failed => Duration::ZERO,
        }
    }

    /// The value to fold into a distribution, if any. Skipped phases count as
    /// a real zero; failed phases contribute nothing.
    pub fn sample(self) -> Option<Duration> {
        match self {
            PhaseTiming::Measured(duration) => Some(duration),
            PhaseTiming::Skipped => Some(Duration::ZERO),
            PhaseTiming::Failed => None,
        }
    }

    pub fn is_measured(self) -> bool {
        matches!(self, PhaseTiming::Measured(_))
    }
}

/// Phase timings of one probe attempt against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRecord {
    pub target: String,
    pub dns: PhaseTiming,
    pub connect: PhaseTiming,
    pub tls: PhaseTiming,
    pub ttfb: PhaseTiming,
    pub round_trip: PhaseTiming,
    pub http_status: Option<u16>,
}

impl TimingRecord {
    pub fn phase(&self, phase: Phase) -> PhaseTiming {
        match phase {
            Phase::Dns => self.dns,
            Phase::Connect => self.connect,
            Phase::Tls => self.tls,
            Phase::Ttfb => self.ttfb,
            Phase::RoundTrip => self.round_trip,
        }
    }

    pub fn phases(&self) -> impl Iterator<Item = (Phase, PhaseTiming)> + '_ {
        Phase::ALL.into_iter().map(|phase| (phase, self.phase(phase)))
    }
}

impl fmt::Display for TimingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "url: {} dns: {:?} connect: {:?} tls: {:?} ttfb: {:?} rtt: {:?}",
            self.target,
            self.dns.as_duration(),
            self.connect.as_duration(),
            self.tls.as_duration(),
            self.ttfb.as_duration(),
            self.round_trip.as_duration(),
        )
    }
}
